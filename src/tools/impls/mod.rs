mod click;
mod forms;
mod navigate;
mod read_page;
mod search_web;

pub use click::ClickTool;
pub use forms::{FillFormTool, SelectOptionTool, SubmitFormTool};
pub use navigate::{GoBackTool, NavigateTool};
pub use read_page::{FindElementsTool, ReadPageTool};
pub use search_web::SearchWebTool;
