pub mod delivery_note;
pub mod inventory;
pub mod line_item;
pub mod process;
pub mod quote;
pub mod work_order;

pub use delivery_note::{DeliveryNote, DeliveryNoteStatus};
pub use inventory::{InventoryItem, ItemKind, StockTransaction, StockTransactionType};
pub use line_item::{Dimensions, LineItem, MaterialUsage, ProcessStep, StepStatus};
pub use process::{PriceType, Process, ThicknessTier};
pub use quote::{PaymentInfo, Quote, QuoteStatus, QuoteTotals};
pub use work_order::{WorkOrder, WorkOrderStatus};
