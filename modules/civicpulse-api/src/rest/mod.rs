pub mod complaints;
