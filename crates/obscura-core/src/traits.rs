//! Traits for the collaborators Obscura calls but does not implement

use async_trait::async_trait;

use crate::error::{AuthError, ConversionError};
use crate::image::TransformedImage;

/// Local authentication factor gating decryption
///
/// Implementations wrap whatever the platform offers (biometrics, device
/// passcode, a terminal confirmation). Obscura only consumes the decision.
#[async_trait]
pub trait AuthenticationGate: Send + Sync {
    /// Whether the gate can run at all on this device
    fn is_available(&self) -> bool;

    /// Ask the user to authenticate
    ///
    /// `reason` is shown to the user. Returns `Ok(())` only on a positive
    /// decision.
    async fn authenticate(&self, reason: &str) -> Result<(), AuthError>;
}

/// Stateless image filter that produces the bytes to be sealed
///
/// The transform is expected to be irreversible (e.g. a blur). It runs
/// synchronously and keeps no state between calls.
pub trait PixelTransform: Send + Sync {
    fn apply(&self, image: &TransformedImage) -> Result<TransformedImage, ConversionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Dimensions;

    struct AlwaysAllow;

    #[async_trait]
    impl AuthenticationGate for AlwaysAllow {
        fn is_available(&self) -> bool {
            true
        }

        async fn authenticate(&self, _reason: &str) -> Result<(), AuthError> {
            Ok(())
        }
    }

    struct Invert;

    impl PixelTransform for Invert {
        fn apply(&self, image: &TransformedImage) -> Result<TransformedImage, ConversionError> {
            let bytes = image.bytes().iter().map(|b| !b).collect();
            TransformedImage::new(bytes, image.dimensions())
        }
    }

    /// Test that the gate trait is object-safe
    fn _assert_object_safe(_: &dyn AuthenticationGate, _: &dyn PixelTransform) {}

    #[tokio::test]
    async fn test_gate_object() {
        let gate: Box<dyn AuthenticationGate> = Box::new(AlwaysAllow);
        assert!(gate.is_available());
        assert!(gate.authenticate("view photo").await.is_ok());
    }

    #[test]
    fn test_transform_object() {
        let transform: Box<dyn PixelTransform> = Box::new(Invert);
        let image = TransformedImage::new(vec![0x0F; 4], Dimensions::new(1, 1)).unwrap();
        let out = transform.apply(&image).unwrap();
        assert_eq!(out.bytes(), &[0xF0; 4]);
        assert_eq!(out.dimensions(), image.dimensions());
    }
}
