//! XMI documents: a streaming reader and a streaming writer.

mod reader;
mod writer;

pub use reader::XmiReader;
pub use writer::{XmiOutput, XmiWriter};

pub const XMI_URI: &str = "http://www.omg.org/XMI";
pub const XSI_URI: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const XMI_PREFIX: &str = "xmi";
pub const XSI_PREFIX: &str = "xsi";
pub const XMI_VERSION: &str = "2.0";

pub(crate) const WRAPPER: &str = "xmi:XMI";
pub(crate) const ID: &str = "xmi:id";
pub(crate) const IDREF: &str = "xmi:idref";
pub(crate) const XSI_TYPE: &str = "xsi:type";
pub(crate) const XMI_TYPE: &str = "xmi:type";
pub(crate) const HREF: &str = "href";
