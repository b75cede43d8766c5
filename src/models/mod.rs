pub mod department;
pub mod inventory;
pub mod requisition;

pub use department::{Department, DEFAULT_DEPARTMENTS};
pub use inventory::{InventoryItem, InventoryRecord};
pub use requisition::{
    ItemSource, RemarkType, RequestStatus, Requisition, RequisitionItem, RequisitionRecord,
    ReturnBranch,
};
