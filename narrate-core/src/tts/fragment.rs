//! Raw audio fragments as produced by a voice model.

/// One piece of audio yielded by a model's incremental synthesis.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioFragment {
    /// Little-endian signed 16-bit PCM bytes.
    Int16Bytes(Vec<u8>),
    /// Already decoded signed 16-bit samples.
    Int16Samples(Vec<i16>),
    /// Anything else a backend might hand back (float tensors, encoded
    /// frames). Not convertible to PCM.
    Other { format: String, bytes: Vec<u8> },
}

impl AudioFragment {
    /// Convert to 16-bit samples, or describe why this fragment can't be.
    pub fn into_samples(self) -> Result<Vec<i16>, String> {
        match self {
            AudioFragment::Int16Samples(samples) => Ok(samples),
            AudioFragment::Int16Bytes(bytes) => {
                if bytes.len() % 2 != 0 {
                    return Err(format!(
                        "16-bit PCM fragment has odd byte length {}",
                        bytes.len()
                    ));
                }
                Ok(bytes
                    .chunks_exact(2)
                    .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                    .collect())
            }
            AudioFragment::Other { format, bytes } => Err(format!(
                "fragment of type '{}' ({} bytes) is not 16-bit PCM",
                format,
                bytes.len()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_are_little_endian() {
        let fragment = AudioFragment::Int16Bytes(vec![0x01, 0x00, 0xff, 0xff, 0x00, 0x80]);
        assert_eq!(fragment.into_samples().unwrap(), vec![1, -1, i16::MIN]);
    }

    #[test]
    fn test_samples_pass_through() {
        let fragment = AudioFragment::Int16Samples(vec![5, -5]);
        assert_eq!(fragment.into_samples().unwrap(), vec![5, -5]);
    }

    #[test]
    fn test_odd_length_rejected() {
        let fragment = AudioFragment::Int16Bytes(vec![1, 2, 3]);
        let err = fragment.into_samples().unwrap_err();
        assert!(err.contains("odd byte length 3"));
    }

    #[test]
    fn test_other_rejected() {
        let fragment = AudioFragment::Other {
            format: "f32".to_string(),
            bytes: vec![0; 8],
        };
        assert!(fragment.into_samples().unwrap_err().contains("f32"));
    }
}
