pub mod slot_check;
