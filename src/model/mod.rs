pub mod issue;
pub mod work_item;
