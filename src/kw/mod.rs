//! Keywords: named, typed, fixed-length arrays.
//!
//! A [`Keyword`] pairs a [`KeywordHeader`] with a [`KeywordData`] whose
//! variant always matches the header's type tag and whose length always
//! equals the declared element count.  Both are enforced at construction;
//! no operation afterwards changes the length.

pub mod codec;
pub mod header;
pub mod types;

use crate::error::{EclError, Result};

pub use header::{KeywordHeader, HEADER_LEN};
pub use types::EclType;

// ── KeywordData ───────────────────────────────────────────────────────────────

/// Element storage, one variant per element representation.
#[derive(Debug, Clone)]
pub enum KeywordData {
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Bool(Vec<bool>),
    /// CHAR and C0nn elements, trailing blanks stripped.
    Str(Vec<String>),
    /// MESS keywords have a count but no element values.
    Mess(usize),
}

impl KeywordData {
    pub fn len(&self) -> usize {
        match self {
            KeywordData::Int(v)    => v.len(),
            KeywordData::Float(v)  => v.len(),
            KeywordData::Double(v) => v.len(),
            KeywordData::Bool(v)   => v.len(),
            KeywordData::Str(v)    => v.len(),
            KeywordData::Mess(n)   => *n,
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn type_name(&self) -> &'static str {
        match self {
            KeywordData::Int(_)    => "INT",
            KeywordData::Float(_)  => "FLOAT",
            KeywordData::Double(_) => "DOUBLE",
            KeywordData::Bool(_)   => "BOOL",
            KeywordData::Str(_)    => "STRING",
            KeywordData::Mess(_)   => "MESSAGE",
        }
    }

    fn matches(&self, ty: EclType) -> bool {
        matches!(
            (self, ty),
            (KeywordData::Int(_), EclType::Int)
                | (KeywordData::Float(_), EclType::Float)
                | (KeywordData::Double(_), EclType::Double)
                | (KeywordData::Bool(_), EclType::Bool)
                | (KeywordData::Str(_), EclType::Char | EclType::String(_))
                | (KeywordData::Mess(_), EclType::Mess)
        )
    }

    fn zeroed(ty: EclType, count: usize) -> Self {
        match ty {
            EclType::Int                      => KeywordData::Int(vec![0; count]),
            EclType::Float                    => KeywordData::Float(vec![0.0; count]),
            EclType::Double                   => KeywordData::Double(vec![0.0; count]),
            EclType::Bool                     => KeywordData::Bool(vec![false; count]),
            EclType::Char | EclType::String(_) => KeywordData::Str(vec![String::new(); count]),
            EclType::Mess                     => KeywordData::Mess(count),
        }
    }

    fn slice(&self, offset: usize, count: usize) -> Self {
        let r = offset..offset + count;
        match self {
            KeywordData::Int(v)    => KeywordData::Int(v[r].to_vec()),
            KeywordData::Float(v)  => KeywordData::Float(v[r].to_vec()),
            KeywordData::Double(v) => KeywordData::Double(v[r].to_vec()),
            KeywordData::Bool(v)   => KeywordData::Bool(v[r].to_vec()),
            KeywordData::Str(v)    => KeywordData::Str(v[r].to_vec()),
            KeywordData::Mess(_)   => KeywordData::Mess(count),
        }
    }
}

/// Float comparison is on bit patterns so that equality is byte-for-byte.
impl PartialEq for KeywordData {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (KeywordData::Int(a), KeywordData::Int(b))       => a == b,
            (KeywordData::Bool(a), KeywordData::Bool(b))     => a == b,
            (KeywordData::Str(a), KeywordData::Str(b))       => a == b,
            (KeywordData::Mess(a), KeywordData::Mess(b))     => a == b,
            (KeywordData::Float(a), KeywordData::Float(b))   => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (KeywordData::Double(a), KeywordData::Double(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            _ => false,
        }
    }
}

/// Borrowed view of a numeric keyword's raw buffer.
#[derive(Debug, Clone, Copy)]
pub enum Numeric<'a> {
    Int(&'a [i32]),
    Float(&'a [f32]),
    Double(&'a [f64]),
}

impl Numeric<'_> {
    pub fn len(&self) -> usize {
        match self {
            Numeric::Int(v)    => v.len(),
            Numeric::Float(v)  => v.len(),
            Numeric::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn get_f64(&self, i: usize) -> f64 {
        match self {
            Numeric::Int(v)    => v[i] as f64,
            Numeric::Float(v)  => v[i] as f64,
            Numeric::Double(v) => v[i],
        }
    }
}

// ── Element ───────────────────────────────────────────────────────────────────

/// Rust types that map one-to-one onto a keyword element type.
pub trait Element: Copy + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    const ECL_TYPE: EclType;
    fn slice(data: &KeywordData) -> Option<&[Self]>;
    fn slice_mut(data: &mut KeywordData) -> Option<&mut [Self]>;
    fn into_data(values: Vec<Self>) -> KeywordData;
}

macro_rules! element {
    ($t:ty, $variant:ident, $ecl:expr) => {
        impl Element for $t {
            const ECL_TYPE: EclType = $ecl;
            fn slice(data: &KeywordData) -> Option<&[Self]> {
                match data { KeywordData::$variant(v) => Some(v), _ => None }
            }
            fn slice_mut(data: &mut KeywordData) -> Option<&mut [Self]> {
                match data { KeywordData::$variant(v) => Some(v), _ => None }
            }
            fn into_data(values: Vec<Self>) -> KeywordData { KeywordData::$variant(values) }
        }
    };
}

element!(i32,  Int,    EclType::Int);
element!(f32,  Float,  EclType::Float);
element!(f64,  Double, EclType::Double);
element!(bool, Bool,   EclType::Bool);

// ── Keyword ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    header: KeywordHeader,
    data:   KeywordData,
}

impl Keyword {
    // ── Constructors ─────────────────────────────────────────────────────────

    /// Build a keyword from typed values.
    pub fn from_values<T: Element>(name: &str, values: Vec<T>) -> Result<Self> {
        let header = KeywordHeader::new(name, values.len(), T::ECL_TYPE)?;
        Ok(Self { header, data: T::into_data(values) })
    }

    pub fn new_int(name: &str, values: Vec<i32>) -> Result<Self> { Self::from_values(name, values) }
    pub fn new_float(name: &str, values: Vec<f32>) -> Result<Self> { Self::from_values(name, values) }
    pub fn new_double(name: &str, values: Vec<f64>) -> Result<Self> { Self::from_values(name, values) }
    pub fn new_bool(name: &str, values: Vec<bool>) -> Result<Self> { Self::from_values(name, values) }

    /// CHAR keyword: every value at most eight characters.
    pub fn new_char<S: AsRef<str>>(name: &str, values: &[S]) -> Result<Self> {
        Self::new_strings(name, EclType::Char, values)
    }

    /// `C0nn` keyword of the given width.
    pub fn new_string<S: AsRef<str>>(name: &str, width: u16, values: &[S]) -> Result<Self> {
        if width == 0 || width > types::MAX_STRING_WIDTH {
            return Err(EclError::InvalidValue(format!("string width {width} outside 1..=999")));
        }
        Self::new_strings(name, EclType::String(width), values)
    }

    pub fn new_mess(name: &str) -> Result<Self> {
        Ok(Self { header: KeywordHeader::new(name, 0, EclType::Mess)?, data: KeywordData::Mess(0) })
    }

    /// A keyword of `count` default elements (zero, false or blank).
    pub fn zeroed(name: &str, ty: EclType, count: usize) -> Result<Self> {
        Ok(Self { header: KeywordHeader::new(name, count, ty)?, data: KeywordData::zeroed(ty, count) })
    }

    /// Pair an existing header with data; both must agree on type and length.
    pub fn from_parts(header: KeywordHeader, data: KeywordData) -> Result<Self> {
        if !data.matches(header.ecl_type()) {
            return Err(EclError::TypeMismatch {
                expected: header.ecl_type().name().to_owned(),
                found:    data.type_name().to_owned(),
            });
        }
        if data.len() != header.count() {
            return Err(EclError::SizeMismatch {
                name:     header.name().to_owned(),
                expected: header.count(),
                actual:   data.len(),
            });
        }
        if let (KeywordData::Str(values), ty) = (&data, header.ecl_type()) {
            for v in values {
                check_string(v, ty.element_size())?;
            }
        }
        Ok(Self { header, data })
    }

    fn new_strings<S: AsRef<str>>(name: &str, ty: EclType, values: &[S]) -> Result<Self> {
        let width = ty.element_size();
        let values = values
            .iter()
            .map(|s| check_string(s.as_ref(), width).map(|s| s.to_owned()))
            .collect::<Result<Vec<_>>>()?;
        let header = KeywordHeader::new(name, values.len(), ty)?;
        Ok(Self { header, data: KeywordData::Str(values) })
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn header(&self) -> &KeywordHeader { &self.header }
    pub fn name(&self) -> &str { self.header.name() }
    pub fn ecl_type(&self) -> EclType { self.header.ecl_type() }
    pub fn len(&self) -> usize { self.header.count() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
    pub fn data(&self) -> &KeywordData { &self.data }
    pub fn into_data(self) -> KeywordData { self.data }

    /// Typed element slice; `None` when `T` is not this keyword's type.
    pub fn values<T: Element>(&self) -> Option<&[T]> { T::slice(&self.data) }

    /// Typed mutable element slice.  Length stays fixed.
    pub fn values_mut<T: Element>(&mut self) -> Option<&mut [T]> { T::slice_mut(&mut self.data) }

    pub fn strings(&self) -> Option<&[String]> {
        match &self.data { KeywordData::Str(v) => Some(v), _ => None }
    }

    /// Raw buffer of an INT, FLOAT or DOUBLE keyword.
    pub fn numeric(&self) -> Option<Numeric<'_>> {
        match &self.data {
            KeywordData::Int(v)    => Some(Numeric::Int(v)),
            KeywordData::Float(v)  => Some(Numeric::Float(v)),
            KeywordData::Double(v) => Some(Numeric::Double(v)),
            _ => None,
        }
    }

    pub fn set_string(&mut self, index: usize, value: &str) -> Result<()> {
        if self.strings().is_none() {
            return Err(self.type_error("CHAR8 or STRING"));
        }
        let width = self.ecl_type().element_size();
        let len = self.len();
        let value = check_string(value, width)?.to_owned();
        if let KeywordData::Str(v) = &mut self.data {
            let slot = v.get_mut(index).ok_or(EclError::Index { index: index as i64, len })?;
            *slot = value;
        }
        Ok(())
    }

    /// Same keyword under a new name.
    pub fn with_name(mut self, name: &str) -> Result<Self> {
        self.header = self.header.renamed(name)?;
        Ok(self)
    }

    /// Bytes this keyword occupies on disk, all record markers included.
    pub fn fortio_size(&self) -> u64 {
        let marker = 2 * crate::fortio::MARKER_SIZE;
        HEADER_LEN as u64 + marker
            + self.header.data_bytes()
            + self.header.data_records() as u64 * marker
    }

    // ── Comparison ───────────────────────────────────────────────────────────

    /// Equality with tolerance for FLOAT and DOUBLE elements.  An epsilon of
    /// zero or less disables that check; INT and the other types compare
    /// exactly.
    pub fn numeric_equal(&self, other: &Keyword, abs_eps: f64, rel_eps: f64) -> bool {
        self.header == other.header && self.first_different(other, 0, abs_eps, rel_eps).is_none()
    }

    /// Index of the first element at or after `offset` that differs beyond
    /// the tolerances, `None` if all match.  Keywords of different type or
    /// length differ at `offset`.
    pub fn first_different(&self, other: &Keyword, offset: usize, abs_eps: f64, rel_eps: f64) -> Option<usize> {
        if self.ecl_type() != other.ecl_type() || self.len() != other.len() {
            return Some(offset);
        }
        let n = self.len();
        match (&self.data, &other.data) {
            (KeywordData::Float(a), KeywordData::Float(b)) => (offset..n)
                .find(|&i| !approx_equal(a[i] as f64, b[i] as f64, abs_eps, rel_eps)),
            (KeywordData::Double(a), KeywordData::Double(b)) => (offset..n)
                .find(|&i| !approx_equal(a[i], b[i], abs_eps, rel_eps)),
            (KeywordData::Int(a), KeywordData::Int(b))   => (offset..n).find(|&i| a[i] != b[i]),
            (KeywordData::Bool(a), KeywordData::Bool(b)) => (offset..n).find(|&i| a[i] != b[i]),
            (KeywordData::Str(a), KeywordData::Str(b))   => (offset..n).find(|&i| a[i] != b[i]),
            (KeywordData::Mess(_), KeywordData::Mess(_)) => None,
            _ => Some(offset),
        }
    }

    // ── Slicing and arithmetic ───────────────────────────────────────────────

    /// Copy `count` elements starting at `offset`, optionally renamed.
    pub fn sub_copy(&self, offset: usize, count: usize, new_name: Option<&str>) -> Result<Keyword> {
        let end = offset.checked_add(count).filter(|&e| e <= self.len());
        if end.is_none() {
            return Err(EclError::Index { index: offset.saturating_add(count) as i64, len: self.len() });
        }
        let header = KeywordHeader::new(new_name.unwrap_or(self.name()), count, self.ecl_type())?;
        Ok(Keyword { header, data: self.data.slice(offset, count) })
    }

    /// The elements at `indices`, in that order, under the same name.
    pub fn select(&self, indices: &[usize]) -> Result<Keyword> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(EclError::Index { index: bad as i64, len: self.len() });
        }
        let data = match &self.data {
            KeywordData::Int(v)    => KeywordData::Int(indices.iter().map(|&i| v[i]).collect()),
            KeywordData::Float(v)  => KeywordData::Float(indices.iter().map(|&i| v[i]).collect()),
            KeywordData::Double(v) => KeywordData::Double(indices.iter().map(|&i| v[i]).collect()),
            KeywordData::Bool(v)   => KeywordData::Bool(indices.iter().map(|&i| v[i]).collect()),
            KeywordData::Str(v)    => KeywordData::Str(indices.iter().map(|&i| v[i].clone()).collect()),
            KeywordData::Mess(_)   => KeywordData::Mess(indices.len()),
        };
        let header = KeywordHeader::new(self.name(), indices.len(), self.ecl_type())?;
        Ok(Keyword { header, data })
    }

    /// Smallest and largest element of a numeric keyword; `None` when empty.
    pub fn min_max(&self) -> Result<Option<(f64, f64)>> {
        let n = self.numeric().ok_or_else(|| self.type_error("numeric"))?;
        Ok((0..n.len()).map(|i| n.get_f64(i)).fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        }))
    }

    pub fn sum(&self) -> Result<f64> {
        let n = self.numeric().ok_or_else(|| self.type_error("numeric"))?;
        Ok((0..n.len()).map(|i| n.get_f64(i)).sum())
    }

    /// Multiply every element by `factor`.  INT keywords need an integral
    /// factor.
    pub fn scale(&mut self, factor: f64) -> Result<()> {
        self.apply(factor, |v, f| v * f, |v, f| v.wrapping_mul(f))
    }

    /// Add `delta` to every element.  INT keywords need an integral delta.
    pub fn shift(&mut self, delta: f64) -> Result<()> {
        self.apply(delta, |v, d| v + d, |v, d| v.wrapping_add(d))
    }

    /// Overwrite every element with `value`.
    pub fn assign(&mut self, value: f64) -> Result<()> {
        self.apply(value, |_, v| v, |_, v| v)
    }

    fn apply(
        &mut self,
        arg: f64,
        float_op: impl Fn(f64, f64) -> f64,
        int_op: impl Fn(i32, i32) -> i32,
    ) -> Result<()> {
        if self.numeric().is_none() {
            return Err(self.type_error("numeric"));
        }
        let name = self.header.name();
        match &mut self.data {
            KeywordData::Float(v)  => v.iter_mut().for_each(|x| *x = float_op(*x as f64, arg) as f32),
            KeywordData::Double(v) => v.iter_mut().for_each(|x| *x = float_op(*x, arg)),
            KeywordData::Int(v) => {
                if arg.fract() != 0.0 || arg.abs() > i32::MAX as f64 {
                    return Err(EclError::InvalidValue(format!(
                        "{arg} is not an integer operand for INT keyword {name}"
                    )));
                }
                let a = arg as i32;
                v.iter_mut().for_each(|x| *x = int_op(*x, a));
            }
            _ => {}
        }
        Ok(())
    }

    fn type_error(&self, expected: &str) -> EclError {
        EclError::TypeMismatch {
            expected: expected.to_owned(),
            found:    self.ecl_type().name().to_owned(),
        }
    }
}

fn check_string(value: &str, width: usize) -> Result<&str> {
    let trimmed = value.trim_end_matches(' ');
    if trimmed.chars().count() > width || trimmed.chars().any(|c| (c as u32) > 0xFF) {
        return Err(EclError::InvalidValue(format!(
            "string {value:?} does not fit a {width}-byte element"
        )));
    }
    Ok(trimmed)
}

/// Two values are close when neither enabled tolerance is exceeded.  The
/// relative difference is taken against `|a| + |b|`.
pub fn approx_equal(a: f64, b: f64, abs_eps: f64, rel_eps: f64) -> bool {
    if a.to_bits() == b.to_bits() || a.abs() + b.abs() == 0.0 {
        return true;
    }
    let diff = (a - b).abs();
    if abs_eps > 0.0 && !(diff <= abs_eps) {
        return false;
    }
    if rel_eps > 0.0 && !(diff / (a.abs() + b.abs()) <= rel_eps) {
        return false;
    }
    abs_eps > 0.0 || rel_eps > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_enforce_type_and_length() {
        let kw = Keyword::new_float("PORO", vec![0.1, 0.2]).unwrap();
        assert_eq!(kw.len(), 2);
        assert_eq!(kw.values::<f32>(), Some(&[0.1f32, 0.2][..]));
        assert!(kw.values::<f64>().is_none());

        let h = KeywordHeader::new("PORO", 3, EclType::Float).unwrap();
        assert!(matches!(
            Keyword::from_parts(h.clone(), KeywordData::Float(vec![0.0; 2])),
            Err(EclError::SizeMismatch { .. })
        ));
        assert!(matches!(
            Keyword::from_parts(h, KeywordData::Int(vec![0; 3])),
            Err(EclError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn only_numeric_types_expose_a_buffer() {
        assert!(Keyword::new_int("A", vec![1]).unwrap().numeric().is_some());
        assert!(Keyword::new_bool("A", vec![true]).unwrap().numeric().is_none());
        assert!(Keyword::new_char("A", &["X"]).unwrap().numeric().is_none());
        assert!(Keyword::new_mess("A").unwrap().numeric().is_none());
    }

    #[test]
    fn strings_must_fit_their_width() {
        assert!(Keyword::new_char("NAMES", &["OK", "NINECHARS"]).is_err());
        let kw = Keyword::new_string("LONG", 12, &["TWELVE CHARS", "pad   "]).unwrap();
        assert_eq!(kw.strings().unwrap()[1], "pad");
        assert_eq!(kw.ecl_type(), EclType::String(12));
    }

    #[test]
    fn numeric_equal_uses_tolerances() {
        let a = Keyword::new_double("P", vec![100.0, 200.0]).unwrap();
        let b = Keyword::new_double("P", vec![100.0, 200.001]).unwrap();
        assert_ne!(a, b);
        assert!(a.numeric_equal(&b, 0.01, 0.0));
        assert!(!a.numeric_equal(&b, 0.0001, 0.0));
        assert!(a.numeric_equal(&b, 0.0, 1e-5));
        assert_eq!(a.first_different(&b, 0, 0.0001, 0.0), Some(1));

        let i = Keyword::new_int("P", vec![1, 2]).unwrap();
        let j = Keyword::new_int("P", vec![1, 3]).unwrap();
        assert!(!i.numeric_equal(&j, 10.0, 10.0));
    }

    #[test]
    fn nan_compares_structurally_equal_to_itself() {
        let a = Keyword::new_float("X", vec![f32::NAN]).unwrap();
        assert_eq!(a, a.clone());
    }

    #[test]
    fn sub_copy_and_arithmetic() {
        let mut kw = Keyword::new_int("SATNUM", vec![1, 2, 3, 4]).unwrap();
        let sub = kw.sub_copy(1, 2, Some("PART")).unwrap();
        assert_eq!(sub.name(), "PART");
        assert_eq!(sub.values::<i32>().unwrap(), &[2, 3]);
        assert!(kw.sub_copy(3, 2, None).is_err());
        assert!(matches!(kw.sub_copy(1, usize::MAX, None), Err(EclError::Index { .. })));

        kw.scale(2.0).unwrap();
        kw.shift(-1.0).unwrap();
        assert_eq!(kw.values::<i32>().unwrap(), &[1, 3, 5, 7]);
        assert_eq!(kw.sum().unwrap(), 16.0);
        assert_eq!(kw.min_max().unwrap(), Some((1.0, 7.0)));
        assert!(kw.scale(0.5).is_err());

        let mut flags = Keyword::new_bool("F", vec![true]).unwrap();
        assert!(matches!(flags.assign(1.0), Err(EclError::TypeMismatch { .. })));
    }

    #[test]
    fn fortio_size_counts_markers() {
        // header: 8 + 16; data: 1500 * 4 bytes in two records (16 bytes of markers)
        let kw = Keyword::zeroed("BIG", EclType::Int, 1500).unwrap();
        assert_eq!(kw.fortio_size(), 24 + 6000 + 16);
        assert_eq!(Keyword::new_mess("M").unwrap().fortio_size(), 24);
    }
}
