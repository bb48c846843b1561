//! Guards rejecting input the fit pipeline cannot handle.

use crate::codec::flat::{FlatForm, Moment, parse_qualified_id};
use crate::codec::meta::{MetaConfig, MetaValue, MetaValues, MetaWidget};
use crate::error::ValidationError;
use crate::parameters::ParameterSet;

/// Relative tolerance used to compare a correlation matrix with the identity
pub const CORRELATION_RTOL: f64 = 1e-5;
/// Absolute tolerance used to compare a correlation matrix with the identity
pub const CORRELATION_ATOL: f64 = 1e-8;

/// Check the flat prior form before it is turned into a [ParameterSet]
///
/// Every value must be finite and every `*-sdev` field must be positive, errors name the
/// offending qualified identifier.
pub fn check_prior(flat: &FlatForm) -> Result<(), ValidationError> {
    for (id, value) in flat.iter() {
        if !value.is_finite() {
            return Err(ValidationError::NonFiniteValue {
                field: id.to_owned(),
                value,
            });
        }
        let is_sdev = parse_qualified_id(id).is_some_and(|q| q.moment == Moment::Sdev);
        if is_sdev && value <= 0.0 {
            return Err(ValidationError::NonPositiveUncertainty {
                field: id.to_owned(),
                sdev: value,
            });
        }
    }
    Ok(())
}

/// Check that the estimates of `prior` are independent
///
/// The flat form holds a mean and a standard deviation per estimate only, so a correlated prior
/// cannot be edited without losing information.
pub fn check_no_correlation(prior: &ParameterSet) -> Result<(), ValidationError> {
    let corr = match prior.correlation() {
        Some(corr) => corr,
        None => return Ok(()),
    };
    let offending = corr.indexed_iter().find(|&((i, j), &c)| {
        let expected = if i == j { 1.0 } else { 0.0 };
        !((c - expected).abs() <= CORRELATION_ATOL + CORRELATION_RTOL * expected)
    });
    match offending {
        Some(((i, j), &correlation)) => {
            let labels: Vec<_> = prior.iter_estimates().map(|(label, _)| label).collect();
            let label = |k: usize| labels.get(k).cloned().unwrap_or_else(|| k.to_string());
            Err(ValidationError::CorrelatedPriorUnsupported {
                first: label(i),
                second: label(j),
                correlation,
            })
        }
        None => Ok(()),
    }
}

/// Check meta values against the declared widget constraints
///
/// Numeric controls must hold numbers within `[min, max]`, dropdowns one of their options.
/// Values without a declaration and text controls are accepted as is.
pub fn check_meta(values: &MetaValues, config: &MetaConfig) -> Result<(), ValidationError> {
    for declaration in config.iter() {
        let name = &declaration.name;
        let value = match values.get(name) {
            Some(value) => value,
            None => continue,
        };
        match &declaration.widget {
            MetaWidget::Number { min, max, .. } => {
                let x = match value {
                    MetaValue::Number(x) => *x,
                    _ => {
                        return Err(ValidationError::MetaWrongType {
                            name: name.clone(),
                            expected: "number",
                            actual: value.type_name(),
                        });
                    }
                };
                let min = min.unwrap_or(f64::NEG_INFINITY);
                let max = max.unwrap_or(f64::INFINITY);
                if !(min..=max).contains(&x) {
                    return Err(ValidationError::MetaOutOfRange {
                        name: name.clone(),
                        value: x,
                        min,
                        max,
                    });
                }
            }
            MetaWidget::Dropdown { options } => {
                let value = value.to_string();
                if !options.contains(&value) {
                    return Err(ValidationError::MetaNotAnOption {
                        name: name.clone(),
                        value,
                        options: options.clone(),
                    });
                }
            }
            MetaWidget::Text => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::meta::MetaDeclaration;

    use ndarray::array;

    #[test]
    fn negative_sdev_names_field() {
        let flat: FlatForm = [("a-mean", 1.0), ("a-sdev", -1.0)].into_iter().collect();
        assert_eq!(
            check_prior(&flat),
            Err(ValidationError::NonPositiveUncertainty {
                field: "a-sdev".into(),
                sdev: -1.0
            })
        );
    }

    #[test]
    fn zero_sdev_of_array_element() {
        let flat: FlatForm = [("E__array_1-mean", 2.0), ("E__array_1-sdev", 0.0)]
            .into_iter()
            .collect();
        assert!(matches!(
            check_prior(&flat),
            Err(ValidationError::NonPositiveUncertainty { field, .. }) if field == "E__array_1-sdev"
        ));
    }

    #[test]
    fn negative_mean_is_fine() {
        let flat: FlatForm = [("a-mean", -1.0), ("a-sdev", 1.0)].into_iter().collect();
        assert_eq!(check_prior(&flat), Ok(()));
    }

    #[test]
    fn non_finite_mean() {
        let flat: FlatForm = [("a-mean", f64::NAN), ("a-sdev", 1.0)].into_iter().collect();
        assert!(matches!(
            check_prior(&flat),
            Err(ValidationError::NonFiniteValue { field, .. }) if field == "a-mean"
        ));
    }

    #[test]
    fn identity_correlation_passes() {
        let prior = ParameterSet::new()
            .with_scalar("a", 0.0, 1.0)
            .with_scalar("b", 0.0, 1.0);
        assert_eq!(check_no_correlation(&prior), Ok(()));
        let prior = prior.with_correlation(array![[1.0, 1e-9], [1e-9, 1.0]]);
        assert_eq!(check_no_correlation(&prior), Ok(()));
    }

    #[test]
    fn correlated_prior_is_rejected() {
        let prior = ParameterSet::new()
            .with_scalar("a", 0.0, 1.0)
            .with_array("b", &[(0.0, 1.0), (0.0, 1.0)])
            .with_correlation(array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.3], [0.0, 0.3, 1.0]]);
        assert_eq!(
            check_no_correlation(&prior),
            Err(ValidationError::CorrelatedPriorUnsupported {
                first: "b__array_0".into(),
                second: "b__array_1".into(),
                correlation: 0.3,
            })
        );
    }

    #[test]
    fn meta_constraints() {
        let config: MetaConfig = [
            MetaDeclaration::number("n_poly", Some(1.0), Some(10.0), Some(1.0)),
            MetaDeclaration::dropdown("kind", ["exp", "poly"]),
            MetaDeclaration::text("comment"),
        ]
        .into_iter()
        .collect();
        let ok = MetaValues::new()
            .with("n_poly", 4)
            .with("kind", "exp")
            .with("comment", "anything");
        assert_eq!(check_meta(&ok, &config), Ok(()));

        let out = ok.clone().with("n_poly", 11);
        assert!(matches!(
            check_meta(&out, &config),
            Err(ValidationError::MetaOutOfRange { value, .. }) if value == 11.0
        ));

        let not_option = ok.clone().with("kind", "sin");
        assert!(matches!(
            check_meta(&not_option, &config),
            Err(ValidationError::MetaNotAnOption { .. })
        ));

        let wrong_type = ok.with("n_poly", "four");
        assert_eq!(
            check_meta(&wrong_type, &config),
            Err(ValidationError::MetaWrongType {
                name: "n_poly".into(),
                expected: "number",
                actual: "text",
            })
        );
    }
}
