/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

pub mod block_decoder;
pub mod frame_buffer;
pub mod idct;
pub mod jpeg_decoder;
pub mod pipeline;
pub mod table_arena;
pub mod tile_compositor;
pub mod tile_sink;
