use std::fmt;
use ndarray::{ArrayD, IxDyn};
use crate::error::{Error, Result};

/// Shape of a tensor
pub type Shape = Vec<usize>;

/// A dense f32 tensor backing one blob of the network.
///
/// Blobs are allocated once per geometry and refilled on every forward pass,
/// so the data array always stays in standard row-major layout.
#[derive(Clone)]
pub struct Tensor {
    /// Blob name, when the tensor is bound to one
    pub name: Option<String>,
    pub shape: Shape,
    pub data: ArrayD<f32>,
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("len", &self.data.len())
            .finish()
    }
}

impl Tensor {
    /// Create a zero-filled tensor of the given shape.
    pub fn new(shape: &[usize]) -> Self {
        Tensor {
            name: None,
            shape: shape.to_vec(),
            data: ArrayD::zeros(IxDyn(shape)),
        }
    }

    /// Create a tensor from raw row-major data.
    pub fn from_vec(shape: &[usize], data: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(Error::InvalidWeights(format!(
                "Tensor data holds {} values but shape {:?} needs {}",
                data.len(),
                shape,
                expected
            )));
        }
        Ok(Tensor {
            name: None,
            shape: shape.to_vec(),
            data: ArrayD::from_shape_vec(IxDyn(shape), data)?,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Contiguous view of the element data.
    pub fn as_slice(&self) -> &[f32] {
        self.data.as_slice().unwrap_or(&[])
    }

    /// Overwrite the element data from a slice of the same length.
    pub fn assign_from_slice(&mut self, src: &[f32]) -> Result<()> {
        if src.len() != self.len() {
            return Err(Error::ExecutionError(format!(
                "Cannot assign {} values into a tensor of {} elements",
                src.len(),
                self.len()
            )));
        }
        match self.data.as_slice_mut() {
            Some(dst) => {
                dst.copy_from_slice(src);
                Ok(())
            }
            None => Err(Error::ExecutionError(
                "Tensor storage is not contiguous".to_string(),
            )),
        }
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_zero_filled() {
        let t = Tensor::new(&[2, 3, 4, 5]);
        assert_eq!(t.shape, vec![2, 3, 4, 5]);
        assert_eq!(t.len(), 120);
        assert!(t.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_from_vec_checks_length() {
        let ok = Tensor::from_vec(&[2, 2], vec![1.0, 2.0, 3.0, 4.0]);
        assert!(ok.is_ok());

        let short = Tensor::from_vec(&[2, 2], vec![1.0, 2.0]);
        assert!(matches!(short, Err(Error::InvalidWeights(_))));
    }

    #[test]
    fn test_assign_from_slice() {
        let mut t = Tensor::new(&[1, 1, 2, 2]);
        t.assign_from_slice(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(t.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(t.data[[0, 0, 1, 0]], 3.0);

        // Length mismatch must not clobber the tensor
        let err = t.assign_from_slice(&[1.0]);
        assert!(err.is_err());
        assert_eq!(t.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_debug_omits_data() {
        let t = Tensor::new(&[4, 4]).with_name("weights");
        let printed = format!("{:?}", t);
        assert!(printed.contains("weights"));
        assert!(printed.contains("len"));
    }
}
