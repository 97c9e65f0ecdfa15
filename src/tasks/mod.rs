pub mod message_poller;
