pub mod melon;
