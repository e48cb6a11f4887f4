pub mod change_record;
pub mod row;
pub mod value;

pub use change_record::{ChangeNotification, ChangeRecord, ChangeType};
pub use row::Row;
pub use value::{Value, ValueType};
