//! Flow type and step name constants.

/// Flow type identifier for purchase invoicing.
pub const PURCHASE_FLOW: &str = "PurchaseInvoicing";

/// Flow type identifier for purchase deletion (full reversal).
pub const PURCHASE_DELETE_FLOW: &str = "PurchaseDeletion";

/// Flow type identifier for profit settlement.
pub const SETTLEMENT_FLOW: &str = "ProfitSettlement";

/// Step name: validate the purchase draft.
pub const STEP_VALIDATE_DRAFT: &str = "validate_draft";

/// Step name: create the invoice record.
pub const STEP_CREATE_INVOICE: &str = "create_invoice";

/// Step name: apply stock increments per invoice line.
pub const STEP_APPLY_STOCK: &str = "apply_stock";

/// Step name: record the supplier payment on the operating account.
pub const STEP_RECORD_PAYMENT: &str = "record_payment";

/// Step name: record expense rows for the purchase.
pub const STEP_RECORD_EXPENSES: &str = "record_expenses";

/// Step name: remove the expense rows of a deleted purchase.
pub const STEP_REMOVE_EXPENSES: &str = "remove_expenses";

/// Step name: refund the supplier payment of a deleted purchase.
pub const STEP_REFUND_PAYMENT: &str = "refund_payment";

/// Step name: back out the stock of a deleted purchase.
pub const STEP_REVERSE_STOCK: &str = "reverse_stock";

/// Step name: mark the purchase invoice as deleted.
pub const STEP_MARK_DELETED: &str = "mark_deleted";

/// Step name: check every claimed profit record before settling.
pub const STEP_CHECK_RECORDS: &str = "check_records";

/// Step name: settle profit records under a shared timestamp.
pub const STEP_SETTLE_RECORDS: &str = "settle_records";

/// Step name: pay the employee dues out of the operating account.
pub const STEP_RECORD_PAYOUT: &str = "record_payout";

/// Step name: record the employee dues expense row.
pub const STEP_RECORD_DUES: &str = "record_dues";
