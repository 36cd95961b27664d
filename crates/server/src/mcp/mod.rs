pub mod load_test_server;
