mod common;

pub mod post_init_tests;
