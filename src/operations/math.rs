//! 数值运算
//!
//! 纯函数：不读写桥接状态。整数运算使用 checked 算术，溢出报告为 `DomainError`。

use super::{CatalogError, Invocation, OperationCatalog};
use crate::bindings::protocol::{BridgeValue, OperationDescriptor, TypeTag};
use crate::core::error::DomainError;
use std::collections::BTreeMap;

pub fn add(a: f64, b: f64) -> f64 {
    a + b
}

pub fn subtract(a: f64, b: f64) -> f64 {
    a - b
}

pub fn multiply(a: f64, b: f64) -> f64 {
    a * b
}

pub fn divide(a: f64, b: f64) -> Result<f64, DomainError> {
    if b == 0.0 {
        return Err(DomainError::DivisionByZero);
    }
    Ok(a / b)
}

/// 非有限结果（如 `0^-1`）不是错误
pub fn power(base: f64, exponent: f64) -> f64 {
    base.powf(exponent)
}

pub fn factorial(n: i64) -> Result<i64, DomainError> {
    if n < 0 {
        return Err(DomainError::NegativeArgument {
            operation: "factorial",
            value: n,
        });
    }
    (2..=n).try_fold(1i64, |acc, k| {
        acc.checked_mul(k).ok_or_else(|| DomainError::Overflow {
            operation: "factorial",
            detail: format!("{}! exceeds {}", n, i64::MAX),
        })
    })
}

/// F(0) = 0, F(1) = 1
pub fn fibonacci(n: i64) -> Result<i64, DomainError> {
    if n < 0 {
        return Err(DomainError::NegativeArgument {
            operation: "fibonacci",
            value: n,
        });
    }
    if n == 0 {
        return Ok(0);
    }
    let (mut a, mut b) = (0i64, 1i64);
    for _ in 1..n {
        let next = a.checked_add(b).ok_or_else(|| DomainError::Overflow {
            operation: "fibonacci",
            detail: format!("F({}) exceeds {}", n, i64::MAX),
        })?;
        a = b;
        b = next;
    }
    Ok(b)
}

pub fn sum(numbers: &[f64]) -> f64 {
    numbers.iter().sum()
}

pub fn average(numbers: &[f64]) -> Result<f64, DomainError> {
    if numbers.is_empty() {
        return Err(DomainError::EmptyInput {
            operation: "average",
        });
    }
    Ok(sum(numbers) / numbers.len() as f64)
}

/// 描述性统计
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    /// 总体标准差
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl Statistics {
    pub fn into_record(self) -> BTreeMap<String, BridgeValue> {
        BTreeMap::from([
            ("count".to_string(), BridgeValue::Integer(self.count as i64)),
            ("sum".to_string(), BridgeValue::Number(self.sum)),
            ("mean".to_string(), BridgeValue::Number(self.mean)),
            ("std".to_string(), BridgeValue::Number(self.std)),
            ("min".to_string(), BridgeValue::Number(self.min)),
            ("max".to_string(), BridgeValue::Number(self.max)),
        ])
    }
}

pub fn statistics(numbers: &[f64]) -> Result<Statistics, DomainError> {
    if numbers.is_empty() {
        return Err(DomainError::EmptyInput {
            operation: "statistics",
        });
    }
    let count = numbers.len();
    let total = sum(numbers);
    let mean = total / count as f64;
    let variance = numbers.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64;

    Ok(Statistics {
        count,
        sum: total,
        mean,
        std: variance.sqrt(),
        min: numbers.iter().copied().fold(f64::INFINITY, f64::min),
        max: numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}

/// 检查矩阵非空且每行列数一致，返回 (行数, 列数)
fn dimensions(matrix: &[Vec<f64>]) -> Result<(usize, usize), DomainError> {
    let columns = match matrix.first() {
        Some(row) if !row.is_empty() => row.len(),
        _ => return Err(DomainError::EmptyMatrix),
    };
    for (index, row) in matrix.iter().enumerate() {
        if row.len() != columns {
            return Err(DomainError::RaggedMatrix {
                row: index,
                expected: columns,
                found: row.len(),
            });
        }
    }
    Ok((matrix.len(), columns))
}

pub fn matrix_multiply(a: &[Vec<f64>], b: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, DomainError> {
    let (rows, inner) = dimensions(a)?;
    let (b_rows, columns) = dimensions(b)?;
    if inner != b_rows {
        return Err(DomainError::DimensionMismatch {
            left_columns: inner,
            right_rows: b_rows,
        });
    }

    let product = (0..rows)
        .map(|i| {
            (0..columns)
                .map(|j| (0..inner).map(|k| a[i][k] * b[k][j]).sum::<f64>())
                .collect::<Vec<f64>>()
        })
        .collect();
    Ok(product)
}

/// 结果以 f64 列表返回，超过 2^53 的量无法精确表示
pub const MAX_EXACT_INTEGER: i64 = 1 << 53;

/// `[a+b+c, a*b*c, max(a,b,c)]`
///
/// 任一分量的绝对值超过 [`MAX_EXACT_INTEGER`] 时返回 `Overflow`。
pub fn sum_product_max(a: i64, b: i64, c: i64) -> Result<[i64; 3], DomainError> {
    let overflow = |what: &str| DomainError::Overflow {
        operation: "sum_product_max",
        detail: format!("{} of ({}, {}, {})", what, a, b, c),
    };
    let total = a
        .checked_add(b)
        .and_then(|s| s.checked_add(c))
        .ok_or_else(|| overflow("sum"))?;
    let product = a
        .checked_mul(b)
        .and_then(|p| p.checked_mul(c))
        .ok_or_else(|| overflow("product"))?;
    let result = [total, product, a.max(b).max(c)];
    let labels = ["sum", "product", "max"];
    if let Some(index) = result.iter().position(|v| v.unsigned_abs() > MAX_EXACT_INTEGER as u64) {
        return Err(overflow(labels[index]));
    }
    Ok(result)
}

fn binary(name: &str, summary: &str) -> OperationDescriptor {
    OperationDescriptor::new(name, vec![TypeTag::Number, TypeTag::Number], TypeTag::Number)
        .summary(summary)
}

pub fn register(catalog: &mut OperationCatalog) -> Result<(), CatalogError> {
    catalog.register(binary("add", "a + b"), |inv: &mut Invocation<'_>| {
        Ok(add(inv.number(0)?, inv.number(1)?).into())
    })?;
    catalog.register(binary("subtract", "a - b"), |inv: &mut Invocation<'_>| {
        Ok(subtract(inv.number(0)?, inv.number(1)?).into())
    })?;
    catalog.register(binary("multiply", "a * b"), |inv: &mut Invocation<'_>| {
        Ok(multiply(inv.number(0)?, inv.number(1)?).into())
    })?;
    catalog.register(
        binary("divide", "a / b; fails when b is zero").fallible(),
        |inv: &mut Invocation<'_>| Ok(divide(inv.number(0)?, inv.number(1)?)?.into()),
    )?;
    catalog.register(binary("power", "base ^ exponent"), |inv: &mut Invocation<'_>| {
        Ok(power(inv.number(0)?, inv.number(1)?).into())
    })?;

    catalog.register(
        OperationDescriptor::new("factorial", vec![TypeTag::Integer], TypeTag::Integer)
            .fallible()
            .summary("n!; fails for negative n or on overflow"),
        |inv: &mut Invocation<'_>| Ok(factorial(inv.integer(0)?)?.into()),
    )?;
    catalog.register(
        OperationDescriptor::new("fibonacci", vec![TypeTag::Integer], TypeTag::Integer)
            .fallible()
            .summary("n-th Fibonacci number; fails for negative n or on overflow"),
        |inv: &mut Invocation<'_>| Ok(fibonacci(inv.integer(0)?)?.into()),
    )?;

    catalog.register(
        OperationDescriptor::new("sum", vec![TypeTag::NumberList], TypeTag::Number)
            .summary("Sum of a list (0 when empty)"),
        |inv: &mut Invocation<'_>| Ok(sum(&inv.numbers(0)?).into()),
    )?;
    catalog.register(
        OperationDescriptor::new("average", vec![TypeTag::NumberList], TypeTag::Number)
            .fallible()
            .summary("Arithmetic mean; fails when empty"),
        |inv: &mut Invocation<'_>| Ok(average(&inv.numbers(0)?)?.into()),
    )?;
    catalog.register(
        OperationDescriptor::new("statistics", vec![TypeTag::NumberList], TypeTag::Record)
            .fallible()
            .summary("count, sum, mean, std, min and max of a list"),
        |inv: &mut Invocation<'_>| {
            Ok(BridgeValue::Record(statistics(&inv.numbers(0)?)?.into_record()))
        },
    )?;

    catalog.register(
        OperationDescriptor::new(
            "matrix_multiply",
            vec![TypeTag::Matrix, TypeTag::Matrix],
            TypeTag::Matrix,
        )
        .fallible()
        .summary("Product of two rectangular matrices"),
        |inv: &mut Invocation<'_>| {
            Ok(matrix_multiply(&inv.matrix(0)?, &inv.matrix(1)?)?.into())
        },
    )?;
    catalog.register(
        OperationDescriptor::new(
            "sum_product_max",
            vec![TypeTag::Integer, TypeTag::Integer, TypeTag::Integer],
            TypeTag::NumberList,
        )
        .fallible()
        .summary("[a+b+c, a*b*c, max] of three integers"),
        |inv: &mut Invocation<'_>| {
            let result = sum_product_max(inv.integer(0)?, inv.integer(1)?, inv.integer(2)?)?;
            Ok(BridgeValue::NumberList(result.iter().map(|&v| v as f64).collect()))
        },
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_arithmetic() {
        assert_eq!(add(2.0, 3.0), 5.0);
        assert_eq!(subtract(2.0, 3.0), -1.0);
        assert_eq!(multiply(2.5, 4.0), 10.0);
        assert_eq!(divide(9.0, 3.0), Ok(3.0));
        assert_eq!(divide(1.0, 0.0), Err(DomainError::DivisionByZero));
        assert_eq!(power(2.0, 10.0), 1024.0);
    }

    #[test]
    fn test_power_non_finite_is_not_error() {
        assert!(power(0.0, -1.0).is_infinite());
        assert!(power(-8.0, 0.5).is_nan());
    }

    #[test]
    fn test_factorial() {
        assert_eq!(factorial(0), Ok(1));
        assert_eq!(factorial(1), Ok(1));
        assert_eq!(factorial(5), Ok(120));
        assert_eq!(factorial(20), Ok(2_432_902_008_176_640_000));
        assert!(matches!(factorial(21), Err(DomainError::Overflow { .. })));
        assert_eq!(
            factorial(-1),
            Err(DomainError::NegativeArgument {
                operation: "factorial",
                value: -1
            })
        );
    }

    #[test]
    fn test_fibonacci() {
        let first: Vec<i64> = (0..10).map(|n| fibonacci(n).unwrap()).collect();
        assert_eq!(first, vec![0, 1, 1, 2, 3, 5, 8, 13, 21, 34]);
        assert_eq!(fibonacci(92), Ok(7_540_113_804_746_346_429));
        assert!(matches!(fibonacci(93), Err(DomainError::Overflow { .. })));
        assert!(matches!(fibonacci(-3), Err(DomainError::NegativeArgument { .. })));
    }

    #[test]
    fn test_list_operations() {
        assert_eq!(sum(&[]), 0.0);
        assert_eq!(sum(&[1.0, 2.0, 3.5]), 6.5);
        assert_eq!(average(&[1.0, 2.0, 3.0, 4.0]), Ok(2.5));
        assert_eq!(
            average(&[]),
            Err(DomainError::EmptyInput {
                operation: "average"
            })
        );
    }

    #[test]
    fn test_statistics() {
        let stats = statistics(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(stats.count, 8);
        assert_eq!(stats.sum, 40.0);
        assert_eq!(stats.mean, 5.0);
        assert_eq!(stats.std, 2.0);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);

        let record = stats.into_record();
        assert_eq!(record.get("count"), Some(&BridgeValue::Integer(8)));
        assert!(statistics(&[]).is_err());
    }

    #[test]
    fn test_matrix_multiply() {
        let a = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let b = vec![vec![5.0, 6.0], vec![7.0, 8.0]];
        assert_eq!(
            matrix_multiply(&a, &b),
            Ok(vec![vec![19.0, 22.0], vec![43.0, 50.0]])
        );

        let row = vec![vec![1.0, 2.0, 3.0]];
        let column = vec![vec![4.0], vec![5.0], vec![6.0]];
        assert_eq!(matrix_multiply(&row, &column), Ok(vec![vec![32.0]]));
    }

    #[test]
    fn test_matrix_multiply_rejects_bad_shapes() {
        let a = vec![vec![1.0, 2.0]];
        assert_eq!(matrix_multiply(&[], &a), Err(DomainError::EmptyMatrix));
        assert_eq!(matrix_multiply(&a, &[vec![]]), Err(DomainError::EmptyMatrix));
        assert_eq!(
            matrix_multiply(&a, &a),
            Err(DomainError::DimensionMismatch {
                left_columns: 2,
                right_rows: 1
            })
        );
        assert!(matches!(
            matrix_multiply(&[vec![1.0, 2.0], vec![3.0]], &a),
            Err(DomainError::RaggedMatrix { row: 1, .. })
        ));
    }

    #[test]
    fn test_sum_product_max() {
        assert_eq!(sum_product_max(2, 3, 4), Ok([9, 24, 4]));
        assert_eq!(sum_product_max(-1, -2, -3), Ok([-6, -6, -1]));
        assert!(sum_product_max(i64::MAX, 1, 0).is_err());
    }

    #[test]
    fn test_sum_product_max_stays_exact_as_f64() {
        // 2^54 能放进 i64，但不能作为 f64 精确往返
        assert!(matches!(
            sum_product_max(1 << 27, 1 << 27, 1),
            Err(DomainError::Overflow { .. })
        ));
        assert!(matches!(
            sum_product_max(MAX_EXACT_INTEGER + 1, 0, 0),
            Err(DomainError::Overflow { .. })
        ));
        assert_eq!(
            sum_product_max(1 << 26, 1 << 26, 2),
            Ok([(1 << 27) + 2, 1 << 53, 1 << 26])
        );
    }

    fn small_matrix(rows: usize, cols: usize) -> impl Strategy<Value = Vec<Vec<f64>>> {
        prop::collection::vec(prop::collection::vec(-100i32..100, cols), rows)
            .prop_map(|m| m.into_iter().map(|r| r.into_iter().map(f64::from).collect()).collect())
    }

    proptest! {
        #[test]
        fn factorial_recurrence(n in 1i64..=20) {
            // n! = n * (n-1)!
            prop_assert_eq!(factorial(n).unwrap(), n * factorial(n - 1).unwrap());
        }

        #[test]
        fn fibonacci_recurrence(n in 2i64..=92) {
            prop_assert_eq!(
                fibonacci(n).unwrap(),
                fibonacci(n - 1).unwrap() + fibonacci(n - 2).unwrap()
            );
        }

        #[test]
        fn negative_inputs_are_domain_errors(n in i64::MIN..0) {
            let factorial_is_negative = matches!(factorial(n), Err(DomainError::NegativeArgument { .. }));
            let fibonacci_is_negative = matches!(fibonacci(n), Err(DomainError::NegativeArgument { .. }));
            prop_assert!(factorial_is_negative);
            prop_assert!(fibonacci_is_negative);
        }

        #[test]
        fn average_lies_between_min_and_max(
            numbers in prop::collection::vec(-1000.0f64..1000.0, 1..50)
        ) {
            let mean = average(&numbers).unwrap();
            let stats = statistics(&numbers).unwrap();
            prop_assert!(mean >= stats.min - 1e-9 && mean <= stats.max + 1e-9);
        }

        #[test]
        fn identity_matrix_is_neutral(m in small_matrix(3, 3)) {
            let identity: Vec<Vec<f64>> = (0..3)
                .map(|i| (0..3).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
                .collect();
            prop_assert_eq!(matrix_multiply(&m, &identity).unwrap(), m.clone());
            prop_assert_eq!(matrix_multiply(&identity, &m).unwrap(), m);
        }

        #[test]
        fn product_shape_follows_operands(
            rows in 1usize..5,
            inner in 1usize..5,
            cols in 1usize..5
        ) {
            let a = vec![vec![1.0; inner]; rows];
            let b = vec![vec![1.0; cols]; inner];
            let product = matrix_multiply(&a, &b).unwrap();
            prop_assert_eq!(product.len(), rows);
            prop_assert!(product.iter().all(|row| row.len() == cols));
            prop_assert!(product.iter().flatten().all(|&v| v == inner as f64));
        }
    }
}
