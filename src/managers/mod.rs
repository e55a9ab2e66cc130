// Linkdock state managers
// Managers handle stateful operations: the reconciled bookmark list.

pub mod list_manager;
