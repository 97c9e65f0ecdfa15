pub mod chat_list;
pub mod feed;
