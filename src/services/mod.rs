pub mod inventory;
pub mod numbering;
pub mod quotes;
pub mod work_orders;

pub use inventory::InventoryService;
pub use quotes::QuoteService;
pub use work_orders::{ArchiveOutcome, WorkOrderService};
