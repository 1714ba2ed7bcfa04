//! Algorithm communication (AC) space.
//!
//! Modules of one chain exchange auxiliary data by publishing buffers under a
//! name. The space only stores descriptors: every payload is owned by its
//! publisher through an [`AcBuffer`], and the space keeps a weak reference to
//! it. Consumers obtain an [`AcView`] stamped with the publisher's cycle
//! counter; reading a view after the publisher has moved on to its next cycle
//! trips a debug assertion, and [`AcView::try_read`] reports it as an error.
//!
//! The set of names is frozen while the owning engine is prepared. Values
//! inside already published buffers may change at any time.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use num_complex::Complex32;
use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, Mutex, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::signal::{Spectrum, Waveform};

/// Element type tag of an AC variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcDataType {
    Unknown,
    Char,
    Int,
    Real,
    Float,
    Double,
    Complex,
    VecFloat,
    User,
}

impl AcDataType {
    /// Numeric tag shared with other hosts of the same module ABI.
    pub fn tag(self) -> u32 {
        match self {
            AcDataType::Unknown => 0,
            AcDataType::Char => 1,
            AcDataType::Int => 2,
            AcDataType::Real => 3,
            AcDataType::Float => 4,
            AcDataType::Double => 5,
            AcDataType::Complex => 6,
            AcDataType::VecFloat => 51,
            AcDataType::User => 1000,
        }
    }

    pub fn from_tag(tag: u32) -> Self {
        match tag {
            1 => AcDataType::Char,
            2 => AcDataType::Int,
            3 => AcDataType::Real,
            4 => AcDataType::Float,
            5 => AcDataType::Double,
            6 => AcDataType::Complex,
            51 => AcDataType::VecFloat,
            1000 => AcDataType::User,
            _ => AcDataType::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AcDataType::Unknown => "unknown",
            AcDataType::Char => "char",
            AcDataType::Int => "int",
            AcDataType::Real => "real",
            AcDataType::Float => "float",
            AcDataType::Double => "double",
            AcDataType::Complex => "complex",
            AcDataType::VecFloat => "vector<float>",
            AcDataType::User => "user",
        }
    }
}

impl fmt::Display for AcDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcError {
    #[error("\"{0}\" is not a valid name for an AC variable (names must be non-empty and contain no whitespace)")]
    InvalidName(String),
    #[error("cannot {operation} AC variables while the AC space is locked for processing (variables: [{}])", .names.join(", "))]
    StructuralMutationWhilePrepared {
        operation: &'static str,
        names: Vec<String>,
    },
    #[error("No algorithm communication variable \"{0}\".")]
    NoSuchVariable(String),
    #[error("The variable \"{name}\" has invalid data type ({found}).")]
    TypeMismatch { name: String, found: AcDataType },
    #[error("The variable \"{name}\" {reason}.")]
    ShapeMismatch { name: String, reason: String },
    #[error("The publisher of AC variable \"{0}\" has dropped its buffer.")]
    Stale(String),
    #[error("The view of AC variable \"{name}\" was taken in cycle {fetched}, but its publisher is in cycle {current}.")]
    Expired {
        name: String,
        fetched: u64,
        current: u64,
    },
}

fn shape(name: &str, reason: impl Into<String>) -> AcError {
    AcError::ShapeMismatch {
        name: name.to_owned(),
        reason: reason.into(),
    }
}

fn type_mismatch(name: &str, found: AcDataType) -> AcError {
    AcError::TypeMismatch {
        name: name.to_owned(),
        found,
    }
}

/// Identity of a published buffer. Several names may share one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AcAddress(usize);

impl AcAddress {
    fn of<T: ?Sized>(ptr: *const T) -> Self {
        Self(ptr.cast::<()>() as usize)
    }
}

/// Shared storage behind an [`AcBuffer`].
pub struct AcCell<T> {
    values: RwLock<Vec<T>>,
    generation: AtomicU64,
}

/// Publisher-owned payload of one or more AC variables.
///
/// The element count is fixed at construction; writers get a slice, never
/// the vector.
pub struct AcBuffer<T> {
    cell: Arc<AcCell<T>>,
}

impl<T> Clone for AcBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: AcElement> AcBuffer<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self {
            cell: Arc::new(AcCell {
                values: RwLock::new(values),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn scalar(value: T) -> Self {
        Self::new(vec![value])
    }

    pub fn len(&self) -> usize {
        self.cell.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn address(&self) -> AcAddress {
        AcAddress::of(Arc::as_ptr(&self.cell))
    }

    pub fn generation(&self) -> u64 {
        self.cell.generation.load(Ordering::Acquire)
    }

    /// Marks the start of a new processing cycle. Views taken before this
    /// call are expired afterwards.
    pub fn next_cycle(&self) -> u64 {
        self.cell.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn read(&self) -> MappedRwLockReadGuard<'_, [T]> {
        RwLockReadGuard::map(self.cell.values.read(), |values| values.as_slice())
    }

    pub fn write(&self) -> MappedRwLockWriteGuard<'_, [T]> {
        RwLockWriteGuard::map(self.cell.values.write(), |values| values.as_mut_slice())
    }

    /// Starts a new cycle and updates the values in one step.
    pub fn publish(&self, update: impl FnOnce(&mut [T])) {
        self.next_cycle();
        update(&mut self.write());
    }

    /// Descriptor with the element's default type tag and a stride of one.
    pub fn variable(&self) -> AcVariable {
        AcVariable::new(self)
    }
}

impl AcBuffer<f32> {
    pub fn from_waveform(wave: &Waveform) -> Self {
        Self::new(wave.as_slice().to_vec())
    }

    /// Descriptor for an interleaved block, stride equal to the channel count.
    pub fn waveform_variable(&self, channels: usize) -> AcVariable {
        AcVariable::new(self).with_stride(channels)
    }
}

impl AcBuffer<Complex32> {
    pub fn from_spectrum(spec: &Spectrum) -> Self {
        Self::new(spec.as_slice().to_vec())
    }

    /// Descriptor for a channel-major spectrum, stride equal to the bin count.
    pub fn spectrum_variable(&self, bins: usize) -> AcVariable {
        AcVariable::new(self).with_stride(bins)
    }
}

/// Type-erased weak reference held by the AC space.
#[doc(hidden)]
#[derive(Clone)]
pub enum AcPayload {
    Bytes(Weak<AcCell<u8>>),
    I32(Weak<AcCell<i32>>),
    F32(Weak<AcCell<f32>>),
    F64(Weak<AcCell<f64>>),
    C32(Weak<AcCell<Complex32>>),
    User(Weak<dyn Any + Send + Sync>),
}

impl AcPayload {
    fn address(&self) -> AcAddress {
        match self {
            AcPayload::Bytes(cell) => AcAddress::of(Weak::as_ptr(cell)),
            AcPayload::I32(cell) => AcAddress::of(Weak::as_ptr(cell)),
            AcPayload::F32(cell) => AcAddress::of(Weak::as_ptr(cell)),
            AcPayload::F64(cell) => AcAddress::of(Weak::as_ptr(cell)),
            AcPayload::C32(cell) => AcAddress::of(Weak::as_ptr(cell)),
            AcPayload::User(value) => AcAddress::of(Weak::as_ptr(value)),
        }
    }

    fn accepts(&self, data_type: AcDataType) -> bool {
        matches!(
            (self, data_type),
            (AcPayload::Bytes(_), AcDataType::Char)
                | (AcPayload::I32(_), AcDataType::Int)
                | (
                    AcPayload::F32(_),
                    AcDataType::Real | AcDataType::Float | AcDataType::VecFloat
                )
                | (AcPayload::F64(_), AcDataType::Double)
                | (AcPayload::C32(_), AcDataType::Complex)
                | (AcPayload::User(_), AcDataType::User | AcDataType::Unknown)
        )
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Element types an [`AcBuffer`] can carry.
pub trait AcElement: sealed::Sealed + Copy + Send + Sync + 'static {
    const DATA_TYPE: AcDataType;

    #[doc(hidden)]
    fn erase(cell: Weak<AcCell<Self>>) -> AcPayload;

    #[doc(hidden)]
    fn recover(payload: &AcPayload) -> Option<&Weak<AcCell<Self>>>;
}

macro_rules! ac_element {
    ($ty:ty, $variant:ident, $data_type:expr) => {
        impl sealed::Sealed for $ty {}

        impl AcElement for $ty {
            const DATA_TYPE: AcDataType = $data_type;

            fn erase(cell: Weak<AcCell<Self>>) -> AcPayload {
                AcPayload::$variant(cell)
            }

            fn recover(payload: &AcPayload) -> Option<&Weak<AcCell<Self>>> {
                match payload {
                    AcPayload::$variant(cell) => Some(cell),
                    _ => None,
                }
            }
        }
    };
}

ac_element!(u8, Bytes, AcDataType::Char);
ac_element!(i32, I32, AcDataType::Int);
ac_element!(f32, F32, AcDataType::Real);
ac_element!(f64, F64, AcDataType::Double);
ac_element!(Complex32, C32, AcDataType::Complex);

/// Descriptor of one published variable.
#[derive(Clone)]
pub struct AcVariable {
    data_type: AcDataType,
    element_count: usize,
    stride: usize,
    payload: AcPayload,
}

impl AcVariable {
    pub fn new<T: AcElement>(buffer: &AcBuffer<T>) -> Self {
        Self {
            data_type: T::DATA_TYPE,
            element_count: buffer.len(),
            stride: 1,
            payload: T::erase(Arc::downgrade(&buffer.cell)),
        }
    }

    /// Publishes an arbitrary shared value under the `User` tag.
    pub fn user<U: Any + Send + Sync>(value: &Arc<U>) -> Self {
        let weak: Weak<U> = Arc::downgrade(value);
        let weak: Weak<dyn Any + Send + Sync> = weak;
        Self {
            data_type: AcDataType::User,
            element_count: 1,
            stride: 1,
            payload: AcPayload::User(weak),
        }
    }

    pub fn with_data_type(mut self, data_type: AcDataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn data_type(&self) -> AcDataType {
        self.data_type
    }

    pub fn element_count(&self) -> usize {
        self.element_count
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn address(&self) -> AcAddress {
        self.payload.address()
    }
}

impl PartialEq for AcVariable {
    fn eq(&self, other: &Self) -> bool {
        self.data_type == other.data_type
            && self.element_count == other.element_count
            && self.stride == other.stride
            && self.address() == other.address()
    }
}

impl fmt::Debug for AcVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcVariable")
            .field("data_type", &self.data_type)
            .field("element_count", &self.element_count)
            .field("stride", &self.stride)
            .field("address", &self.address())
            .finish()
    }
}

/// Read handle on a published buffer, valid for the publisher's current
/// cycle.
pub struct AcView<T> {
    name: String,
    cell: Arc<AcCell<T>>,
    generation: u64,
}

impl<T: AcElement> AcView<T> {
    fn fetch(name: &str, variable: &AcVariable) -> Result<Self, AcError> {
        let cell = T::recover(&variable.payload)
            .ok_or_else(|| type_mismatch(name, variable.data_type))?
            .upgrade()
            .ok_or_else(|| AcError::Stale(name.to_owned()))?;
        if cell.values.read().len() < variable.element_count {
            return Err(shape(name, "holds fewer entries than its descriptor declares"));
        }
        let generation = cell.generation.load(Ordering::Acquire);
        Ok(Self {
            name: name.to_owned(),
            cell,
            generation,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.cell.generation.load(Ordering::Acquire) == self.generation
    }

    pub fn read(&self) -> MappedRwLockReadGuard<'_, [T]> {
        debug_assert!(
            self.is_current(),
            "AC variable \"{}\" was read after its publisher started a new cycle",
            self.name
        );
        RwLockReadGuard::map(self.cell.values.read(), |values| values.as_slice())
    }

    pub fn try_read(&self) -> Result<MappedRwLockReadGuard<'_, [T]>, AcError> {
        let current = self.cell.generation.load(Ordering::Acquire);
        if current != self.generation {
            return Err(AcError::Expired {
                name: self.name.clone(),
                fetched: self.generation,
                current,
            });
        }
        Ok(RwLockReadGuard::map(self.cell.values.read(), |values| {
            values.as_slice()
        }))
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.read().to_vec()
    }
}

/// Interleaved waveform published through the AC space.
pub struct WaveformView {
    view: AcView<f32>,
    frames: usize,
    channels: usize,
}

impl WaveformView {
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn view(&self) -> &AcView<f32> {
        &self.view
    }

    pub fn value(&self, frame: usize, channel: usize) -> f32 {
        self.view.read()[frame * self.channels + channel]
    }

    pub fn to_waveform(&self) -> Waveform {
        let mut wave = Waveform::new(self.frames, self.channels);
        let len = self.frames * self.channels;
        wave.as_mut_slice()
            .copy_from_slice(&self.view.read()[..len]);
        wave
    }
}

/// Channel-major spectrum published through the AC space.
pub struct SpectrumView {
    view: AcView<Complex32>,
    bins: usize,
    channels: usize,
}

impl SpectrumView {
    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn view(&self) -> &AcView<Complex32> {
        &self.view
    }

    pub fn value(&self, bin: usize, channel: usize) -> Complex32 {
        self.view.read()[channel * self.bins + bin]
    }

    pub fn to_spectrum(&self) -> Spectrum {
        let mut spec = Spectrum::new(self.bins, self.channels);
        let len = self.bins * self.channels;
        spec.as_mut_slice()
            .copy_from_slice(&self.view.read()[..len]);
        spec
    }
}

/// Mutation gate over the key set of an [`AcSpace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StructureGate {
    #[default]
    Open,
    /// The owning engine is prepared; keys may not be added or removed.
    Sealed,
}

impl StructureGate {
    pub fn is_sealed(self) -> bool {
        self == StructureGate::Sealed
    }

    fn admit(self, operation: &'static str, names: &[String]) -> Result<(), AcError> {
        match self {
            StructureGate::Open => Ok(()),
            StructureGate::Sealed => Err(AcError::StructuralMutationWhilePrepared {
                operation,
                names: names.to_vec(),
            }),
        }
    }
}

#[derive(Default)]
struct AcRegistry {
    entries: Vec<(String, AcVariable)>,
    gate: StructureGate,
}

impl AcRegistry {
    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key == name)
    }
}

fn validate_name(name: &str) -> Result<(), AcError> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(AcError::InvalidName(name.to_owned()));
    }
    Ok(())
}

/// Name-addressed registry shared by every module of one chain.
///
/// Cloning yields another handle on the same registry.
#[derive(Clone, Default)]
pub struct AcSpace {
    registry: Arc<Mutex<AcRegistry>>,
}

impl AcSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `variable` under `name`. Replacing the descriptor of an
    /// existing name is allowed even while the space is sealed.
    pub fn insert(&self, name: &str, variable: AcVariable) -> Result<(), AcError> {
        validate_name(name)?;
        if !variable.payload.accepts(variable.data_type) {
            return Err(type_mismatch(name, variable.data_type));
        }
        let mut registry = self.registry.lock();
        match registry.position(name) {
            Some(index) => registry.entries[index].1 = variable,
            None => {
                registry.gate.admit("insert", &[name.to_owned()])?;
                registry.entries.push((name.to_owned(), variable));
            }
        }
        tracing::trace!(name, "AC variable published");
        Ok(())
    }

    /// Removes `name`. Absent names are ignored, unless the space is sealed,
    /// in which case the call always fails.
    pub fn erase_by_name(&self, name: &str) -> Result<(), AcError> {
        let mut registry = self.registry.lock();
        registry.gate.admit("erase", &[name.to_owned()])?;
        if let Some(index) = registry.position(name) {
            registry.entries.remove(index);
        }
        Ok(())
    }

    /// Removes every name referring to `address` and returns those names.
    /// While sealed nothing is removed and the error lists all of them.
    pub fn erase_by_address(&self, address: AcAddress) -> Result<Vec<String>, AcError> {
        let mut registry = self.registry.lock();
        let names: Vec<String> = registry
            .entries
            .iter()
            .filter(|(_, variable)| variable.address() == address)
            .map(|(name, _)| name.clone())
            .collect();
        registry.gate.admit("erase", &names)?;
        registry
            .entries
            .retain(|(_, variable)| variable.address() != address);
        Ok(names)
    }

    pub fn get(&self, name: &str) -> Result<AcVariable, AcError> {
        let registry = self.registry.lock();
        registry
            .position(name)
            .map(|index| registry.entries[index].1.clone())
            .ok_or_else(|| AcError::NoSuchVariable(name.to_owned()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.lock().position(name).is_some()
    }

    /// Names in insertion order.
    pub fn entries(&self) -> Vec<String> {
        self.registry
            .lock()
            .entries
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.registry.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_locked(&self, locked: bool) {
        self.registry.lock().gate = if locked {
            StructureGate::Sealed
        } else {
            StructureGate::Open
        };
    }

    pub fn is_locked(&self) -> bool {
        self.gate().is_sealed()
    }

    pub fn gate(&self) -> StructureGate {
        self.registry.lock().gate
    }

    pub fn view<T: AcElement>(&self, name: &str) -> Result<AcView<T>, AcError> {
        let variable = self.get(name)?;
        AcView::fetch(name, &variable)
    }

    pub fn get_int(&self, name: &str) -> Result<i32, AcError> {
        let variable = self.scalar(name)?;
        match variable.data_type {
            AcDataType::Int => Ok(AcView::<i32>::fetch(name, &variable)?.read()[0]),
            other => Err(type_mismatch(name, other)),
        }
    }

    /// Scalar read accepting int, float, real and double variables.
    pub fn get_float(&self, name: &str) -> Result<f32, AcError> {
        let variable = self.scalar(name)?;
        match variable.data_type {
            AcDataType::Int => Ok(AcView::<i32>::fetch(name, &variable)?.read()[0] as f32),
            AcDataType::Float | AcDataType::Real => {
                Ok(AcView::<f32>::fetch(name, &variable)?.read()[0])
            }
            AcDataType::Double => Ok(AcView::<f64>::fetch(name, &variable)?.read()[0] as f32),
            other => Err(type_mismatch(name, other)),
        }
    }

    /// Scalar read accepting int, float, real and double variables.
    pub fn get_double(&self, name: &str) -> Result<f64, AcError> {
        let variable = self.scalar(name)?;
        match variable.data_type {
            AcDataType::Int => Ok(f64::from(AcView::<i32>::fetch(name, &variable)?.read()[0])),
            AcDataType::Float | AcDataType::Real => Ok(f64::from(
                AcView::<f32>::fetch(name, &variable)?.read()[0],
            )),
            AcDataType::Double => Ok(AcView::<f64>::fetch(name, &variable)?.read()[0]),
            other => Err(type_mismatch(name, other)),
        }
    }

    pub fn get_vfloat(&self, name: &str) -> Result<Vec<f32>, AcError> {
        let variable = self.get(name)?;
        match variable.data_type {
            AcDataType::Real | AcDataType::Float | AcDataType::VecFloat => {
                let view = AcView::<f32>::fetch(name, &variable)?;
                let values = view.read();
                Ok(values[..variable.element_count].to_vec())
            }
            other => Err(type_mismatch(name, other)),
        }
    }

    /// Interprets a variable as an interleaved waveform whose stride is the
    /// channel count.
    pub fn waveform(&self, name: &str) -> Result<WaveformView, AcError> {
        let variable = self.get(name)?;
        let (channels, frames) = split_by_stride(name, &variable)?;
        if !matches!(variable.data_type, AcDataType::Real | AcDataType::Float) {
            return Err(type_mismatch(name, variable.data_type));
        }
        Ok(WaveformView {
            view: AcView::fetch(name, &variable)?,
            frames,
            channels,
        })
    }

    /// Interprets a variable as a channel-major spectrum whose stride is the
    /// bin count.
    pub fn spectrum(&self, name: &str) -> Result<SpectrumView, AcError> {
        let variable = self.get(name)?;
        let (bins, channels) = split_by_stride(name, &variable)?;
        if variable.data_type != AcDataType::Complex {
            return Err(type_mismatch(name, variable.data_type));
        }
        Ok(SpectrumView {
            view: AcView::fetch(name, &variable)?,
            bins,
            channels,
        })
    }

    pub fn get_user<U: Any + Send + Sync>(&self, name: &str) -> Result<Arc<U>, AcError> {
        let variable = self.get(name)?;
        let AcPayload::User(value) = &variable.payload else {
            return Err(type_mismatch(name, variable.data_type));
        };
        value
            .upgrade()
            .ok_or_else(|| AcError::Stale(name.to_owned()))?
            .downcast::<U>()
            .map_err(|_| type_mismatch(name, variable.data_type))
    }

    fn scalar(&self, name: &str) -> Result<AcVariable, AcError> {
        let variable = self.get(name)?;
        if variable.element_count != 1 {
            return Err(shape(name, "contains not exactly one entry"));
        }
        Ok(variable)
    }
}

/// Returns `(stride, element_count / stride)` after validating the shape.
fn split_by_stride(name: &str, variable: &AcVariable) -> Result<(usize, usize), AcError> {
    let stride = variable.stride;
    let count = variable.element_count;
    if stride == 0 || stride > count {
        return Err(shape(name, format!("has invalid stride settings ({stride})")));
    }
    let rest = count / stride;
    if rest * stride != count {
        return Err(shape(
            name,
            format!("has invalid stride settings ({stride}): Not an integer fraction of entries"),
        ));
    }
    Ok((stride, rest))
}

impl fmt::Debug for AcSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("AcSpace")
            .field("gate", &registry.gate)
            .field(
                "entries",
                &registry
                    .entries
                    .iter()
                    .map(|(name, _)| name.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_space_allows_replacing_existing_names() {
        let space = AcSpace::new();
        let first = AcBuffer::scalar(1_i32);
        let second = AcBuffer::scalar(2_i32);
        space.insert("level", first.variable()).expect("insert");
        space.set_locked(true);

        space
            .insert("level", second.variable())
            .expect("replacing keeps the key set");
        assert_eq!(space.get_int("level").expect("int"), 2);

        let err = space
            .insert("other", second.variable())
            .expect_err("new key while sealed");
        assert!(matches!(
            err,
            AcError::StructuralMutationWhilePrepared { operation: "insert", .. }
        ));
    }

    #[test]
    fn mismatched_type_tag_is_rejected_on_insert() {
        let space = AcSpace::new();
        let buffer = AcBuffer::scalar(1.0_f64);
        let err = space
            .insert("x", buffer.variable().with_data_type(AcDataType::Int))
            .expect_err("double payload tagged as int");
        assert!(matches!(err, AcError::TypeMismatch { .. }));
    }

    #[test]
    fn dropped_publisher_leaves_a_stale_entry() {
        let space = AcSpace::new();
        let buffer = AcBuffer::scalar(3_i32);
        space.insert("count", buffer.variable()).expect("insert");
        drop(buffer);
        assert_eq!(
            space.get_int("count"),
            Err(AcError::Stale("count".into()))
        );
    }

    #[test]
    fn expired_views_are_reported_by_try_read() {
        let space = AcSpace::new();
        let buffer = AcBuffer::new(vec![0.0_f32; 4]);
        space.insert("gains", buffer.variable()).expect("insert");

        let view = space.view::<f32>("gains").expect("view");
        assert!(view.try_read().is_ok());
        buffer.publish(|values| values.fill(1.0));
        assert!(!view.is_current());
        assert!(matches!(view.try_read(), Err(AcError::Expired { .. })));
    }

    #[test]
    fn user_payloads_downcast_to_their_type() {
        let space = AcSpace::new();
        let value = Arc::new(String::from("left"));
        space.insert("label", AcVariable::user(&value)).expect("insert");
        assert_eq!(space.get_user::<String>("label").expect("user").as_str(), "left");
        assert!(space.get_user::<u64>("label").is_err());
    }

    #[test]
    fn data_type_tags_round_trip() {
        for ty in [
            AcDataType::Char,
            AcDataType::Int,
            AcDataType::Real,
            AcDataType::Float,
            AcDataType::Double,
            AcDataType::Complex,
            AcDataType::VecFloat,
            AcDataType::User,
        ] {
            assert_eq!(AcDataType::from_tag(ty.tag()), ty);
        }
        assert_eq!(AcDataType::from_tag(77), AcDataType::Unknown);
    }
}
