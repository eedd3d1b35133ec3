mod algorithm;
mod encoding;
mod hyperparams;
mod iter;
mod split;
mod value;

pub use algorithm::*;
pub use encoding::*;
pub use hyperparams::*;
pub use iter::*;
pub use split::*;
pub use value::*;
