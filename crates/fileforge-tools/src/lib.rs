pub mod convert;
pub mod fetch;
pub mod media;
pub mod password;
pub mod qr;
pub mod resize;

pub use convert::{ConvertConfig, FormatConverter};
pub use fetch::{DocumentFetcher, FetchConfig, FetchInput};
pub use media::{ImageInput, TargetFormat};
pub use password::{PasswordConfig, PasswordGenerator, PasswordInput, generate_password};
pub use qr::{ErrorCorrection, QrConfig, QrFormat, QrGenerator, QrInput};
pub use resize::{ImageResizer, ResizeConfig, ResizeFilter};
