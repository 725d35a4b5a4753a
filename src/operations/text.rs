//! 文本运算

use super::{CatalogError, Invocation, OperationCatalog};
use crate::bindings::protocol::{OperationDescriptor, TypeTag};

pub const PROCESSED_PREFIX: &str = "Processed: ";

pub fn concatenate(a: &str, b: &str) -> String {
    let mut joined = String::with_capacity(a.len() + b.len());
    joined.push_str(a);
    joined.push_str(b);
    joined
}

/// Unicode 标量值个数，而非字节数
pub fn text_length(s: &str) -> i64 {
    s.chars().count() as i64
}

pub fn process_text(input: &str) -> String {
    format!("{}{}", PROCESSED_PREFIX, input)
}

pub fn register(catalog: &mut OperationCatalog) -> Result<(), CatalogError> {
    catalog.register(
        OperationDescriptor::new("concatenate", vec![TypeTag::Text, TypeTag::Text], TypeTag::Text)
            .summary("a followed by b"),
        |inv: &mut Invocation<'_>| Ok(concatenate(&inv.text(0)?, &inv.text(1)?).into()),
    )?;
    catalog.register(
        OperationDescriptor::new("text_length", vec![TypeTag::Text], TypeTag::Integer)
            .summary("Number of characters"),
        |inv: &mut Invocation<'_>| Ok(text_length(&inv.text(0)?).into()),
    )?;
    catalog.register(
        OperationDescriptor::new("process_text", vec![TypeTag::Text], TypeTag::Text)
            .summary("Prefix the input with \"Processed: \""),
        |inv: &mut Invocation<'_>| Ok(process_text(&inv.text(0)?).into()),
    )?;
    Ok(())
}
