/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComponentInfo {
    /// jpeg internal id
    pub jid: u8,

    /// sample factor horizontal
    pub sfh: u8,

    /// sample factor vertical
    pub sfv: u8,

    /// quantization table
    pub q_table_index: u8,

    /// no of huffman table (DC)
    pub huff_dc: u8,

    /// no of huffman table (AC)
    pub huff_ac: u8,
}
