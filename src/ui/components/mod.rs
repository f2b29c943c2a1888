mod confirm;
mod input;
mod key_result;

pub use confirm::ConfirmPrompt;
pub use input::{InputResult, TextInput};
pub use key_result::KeyResult;
