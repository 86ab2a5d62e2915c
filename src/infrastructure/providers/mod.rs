pub mod inventory;

pub use inventory::InventoryProvider;
