pub mod add_categorization_rule;
pub mod common;
pub mod crawl_website;
pub mod get_background_crawl_status;
pub mod get_categorization_rules;
pub mod get_learning_bits;
pub mod get_learning_statistics;
pub mod search_learning_bits;
pub mod search_web;
pub mod start_background_crawl;
pub mod stop_background_crawl;
