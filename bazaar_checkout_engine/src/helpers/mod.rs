mod allocation;
mod ids;
mod totals;

pub use allocation::{allocate_lines, vendor_discount, AllocationError, LineAllocation};
pub use ids::{new_order_id, new_txn_id};
pub use totals::OrderTotals;
