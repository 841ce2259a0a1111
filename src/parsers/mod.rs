pub mod packet_parser;
pub mod range_parser;
