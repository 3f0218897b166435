//! Module for parsing the byte level structure of a baseline JPEG.
//!
//! Everything here works directly on the caller's byte source through a fixed size
//! window, and all tables are carved out of the decoder's table arena, so parsing a
//! header never allocates.

pub mod bit_reader;
pub mod component_info;
pub mod huffman_table;
pub mod input_window;
pub mod jpeg_code;
pub mod jpeg_header;
pub mod quantization_table;
