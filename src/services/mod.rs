pub mod admin_service;
pub mod aggregator;
pub mod cart_service;
pub mod cart_sources;
pub mod checkout;
pub mod mailer;
pub mod notices;
pub mod order_service;
pub mod order_status;
pub mod webhook_service;
