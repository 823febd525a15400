mod codec_tests;
mod server_tests;
