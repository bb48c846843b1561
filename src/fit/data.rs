use crate::error::FitDataError;
use crate::estimate::ScalarEstimate;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Either a single array or an ordered string-keyed mapping of arrays
///
/// Used for independent data, dependent data and model output alike.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Shaped<T> {
    Single(Vec<T>),
    Keyed(Vec<(String, Vec<T>)>),
}

impl<T> Shaped<T> {
    pub fn keyed<K, V>(items: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Vec<T>>,
    {
        Self::Keyed(items.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Keys of a keyed value, `None` for a single array
    pub fn keys(&self) -> Option<Vec<&str>> {
        match self {
            Self::Single(_) => None,
            Self::Keyed(items) => Some(items.iter().map(|(k, _)| k.as_str()).collect()),
        }
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        match self {
            Self::Single(v) => v.len(),
            Self::Keyed(items) => items.iter().map(|(_, v)| v.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Array stored under `key`, a single array is returned for any key
    pub fn get(&self, key: &str) -> Option<&[T]> {
        match self {
            Self::Single(v) => Some(&v[..]),
            Self::Keyed(items) => items.iter().find(|(k, _)| k == key).map(|(_, v)| &v[..]),
        }
    }

    /// Arrays in order, a single array is labelled with `None`
    pub fn parts(&self) -> Vec<(Option<&str>, &[T])> {
        match self {
            Self::Single(v) => vec![(None, &v[..])],
            Self::Keyed(items) => items.iter().map(|(k, v)| (Some(k.as_str()), &v[..])).collect(),
        }
    }

    pub fn iter_flat(&self) -> impl Iterator<Item = &T> {
        self.parts().into_iter().flat_map(|(_, v)| v.iter())
    }

    /// Apply `f` element-wise keeping the structure
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> Shaped<U> {
        match self {
            Self::Single(v) => Shaped::Single(v.iter().map(&mut f).collect()),
            Self::Keyed(items) => Shaped::Keyed(
                items
                    .iter()
                    .map(|(k, v)| (k.clone(), v.iter().map(&mut f).collect()))
                    .collect(),
            ),
        }
    }

    /// Rebuild the structure of `self` from a flat vector with the same total length
    pub fn reshape<U: Clone>(&self, flat: &[U]) -> Shaped<U> {
        assert_eq!(flat.len(), self.len(), "flat vector has a wrong length");
        match self {
            Self::Single(_) => Shaped::Single(flat.to_vec()),
            Self::Keyed(items) => {
                let mut offset = 0;
                Shaped::Keyed(
                    items
                        .iter()
                        .map(|(k, v)| {
                            let part = flat[offset..offset + v.len()].to_vec();
                            offset += v.len();
                            (k.clone(), part)
                        })
                        .collect(),
                )
            }
        }
    }

    /// Same variant, keys and lengths
    pub fn same_structure<U>(&self, other: &Shaped<U>) -> bool {
        match (self, other) {
            (Self::Single(a), Shaped::Single(b)) => a.len() == b.len(),
            (Self::Keyed(a), Shaped::Keyed(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va.len() == vb.len())
            }
            _ => false,
        }
    }
}

impl<T> From<Vec<T>> for Shaped<T> {
    fn from(v: Vec<T>) -> Self {
        Self::Single(v)
    }
}

impl<T: Clone> From<Array1<T>> for Shaped<T> {
    fn from(a: Array1<T>) -> Self {
        Self::Single(a.to_vec())
    }
}

/// Data of a fit: independent variable `x` and dependent variable `y` with uncertainties
///
/// When `x` is a single array while `y` is keyed, the same `x` is shared by all keys.
/// An empty `x` means the model does not depend on an independent variable.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FitData {
    x: Shaped<f64>,
    y: Shaped<ScalarEstimate>,
}

impl FitData {
    pub fn new(
        x: impl Into<Shaped<f64>>,
        y: impl Into<Shaped<ScalarEstimate>>,
    ) -> Result<Self, FitDataError> {
        let x = x.into();
        let y = y.into();
        if y.is_empty() {
            return Err(FitDataError::Empty);
        }
        match (&x, &y) {
            (Shaped::Single(xs), Shaped::Single(ys)) if !xs.is_empty() && xs.len() != ys.len() => {
                return Err(FitDataError::LengthMismatch {
                    x: xs.len(),
                    y: ys.len(),
                });
            }
            (Shaped::Keyed(_), Shaped::Single(_)) => {
                return Err(FitDataError::KeysMismatch {
                    x: owned_keys(&x),
                    y: vec![],
                });
            }
            (Shaped::Keyed(xs), Shaped::Keyed(ys)) => {
                if owned_keys(&x) != owned_keys(&y) {
                    return Err(FitDataError::KeysMismatch {
                        x: owned_keys(&x),
                        y: owned_keys(&y),
                    });
                }
                if let Some(((_, xv), (_, yv))) = xs
                    .iter()
                    .zip(ys.iter())
                    .find(|((_, xv), (_, yv))| xv.len() != yv.len())
                {
                    return Err(FitDataError::LengthMismatch {
                        x: xv.len(),
                        y: yv.len(),
                    });
                }
            }
            _ => {}
        }
        Ok(Self { x, y })
    }

    /// Data without an independent variable
    pub fn y_only(y: impl Into<Shaped<ScalarEstimate>>) -> Result<Self, FitDataError> {
        Self::new(Shaped::Single(vec![]), y)
    }

    pub fn x(&self) -> &Shaped<f64> {
        &self.x
    }

    pub fn y(&self) -> &Shaped<ScalarEstimate> {
        &self.y
    }

    /// Independent variable for the part of `y` labelled with `key`
    pub fn x_for(&self, key: Option<&str>) -> &[f64] {
        match (&self.x, key) {
            (Shaped::Single(v), _) => &v[..],
            (Shaped::Keyed(_), Some(key)) => self.x.get(key).unwrap_or(&[]),
            (Shaped::Keyed(_), None) => &[],
        }
    }

    pub fn n_points(&self) -> usize {
        self.y.len()
    }
}

fn owned_keys<T>(s: &Shaped<T>) -> Vec<String> {
    s.keys()
        .unwrap_or_default()
        .into_iter()
        .map(str::to_owned)
        .collect()
}
