pub mod stub_service;
