pub mod dictionary_item;
pub mod dictionary_type;
pub mod message;
pub mod product_capability;
pub mod region;
pub mod role;
pub mod survey;
pub mod system_log;
pub mod user;
