use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Where values or activity flags are defined.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataLocation
{
    #[default]
    Points,
    Cells,
}

///
/// Per-point or per-cell activity flags. An empty mask means every entity is
/// active; a non-empty mask treats indices past its end as inactive.
///
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityMask
{
    location: DataLocation,
    flags: Vec<bool>,
}

impl ActivityMask
{
    pub fn new(flags: Vec<bool>, location: DataLocation) -> Self
    {
        Self { location, flags }
    }

    pub fn all_active() -> Self
    {
        Self::default()
    }

    #[inline]
    pub fn location(&self) -> DataLocation
    {
        self.location
    }

    #[inline]
    pub fn flags(&self) -> &[bool]
    {
        &self.flags
    }

    #[inline]
    pub fn len(&self) -> usize
    {
        self.flags.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool
    {
        self.flags.is_empty()
    }

    #[inline]
    pub fn is_active(&self, index: usize) -> bool
    {
        self.flags.is_empty() || self.flags.get(index).copied().unwrap_or(false)
    }
}

///
/// One timestep of scalar data. Never modified after construction; a new
/// timestep replaces the whole field.
///
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalarField
{
    location: DataLocation,
    values: Vec<f64>,
    activity: ActivityMask,
}

impl ScalarField
{
    /// Values of any float type are widened to `f64`.
    pub fn new<T: Float>(location: DataLocation, values: &[T], activity: ActivityMask) -> Self
    {
        let values = values.iter().map(|v| v.to_f64().unwrap_or(f64::NAN)).collect();
        Self { location, values, activity }
    }

    pub fn from_values(location: DataLocation, values: Vec<f64>, activity: ActivityMask) -> Self
    {
        Self { location, values, activity }
    }

    #[inline]
    pub fn location(&self) -> DataLocation
    {
        self.location
    }

    #[inline]
    pub fn values(&self) -> &[f64]
    {
        &self.values
    }

    #[inline]
    pub fn activity(&self) -> &ActivityMask
    {
        &self.activity
    }

    /// Value at `index`; missing and non-finite values have no data.
    #[inline]
    pub fn value(&self, index: usize) -> Option<f64>
    {
        self.values.get(index).copied().filter(|v| v.is_finite())
    }
}

#[test]
fn check_activity_mask()
{
    let mask = ActivityMask::all_active();
    assert!(mask.is_active(0) && mask.is_active(100));
    let mask = ActivityMask::new(vec![true, false], DataLocation::Cells);
    assert!(mask.is_active(0));
    assert!(!mask.is_active(1));
    assert!(!mask.is_active(2));
    assert_eq!(mask.location(), DataLocation::Cells);
}

#[test]
fn check_scalar_field_values()
{
    let field = ScalarField::new(DataLocation::Points, &[1.5f32, f32::NAN], ActivityMask::all_active());
    assert_eq!(field.value(0), Some(1.5));
    assert_eq!(field.value(1), None);
    assert_eq!(field.value(2), None);
    assert_eq!(field.values().len(), 2);
}
