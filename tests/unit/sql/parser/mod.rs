pub mod select_parser_test;
