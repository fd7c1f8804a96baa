use uuid::Uuid;

/// Identifier generation as an injected capability, so tests can pin storage
/// keys to known values.
pub trait IdSource: Send + Sync {
    /// Identifier for a download record (UUID, hyphenated).
    fn download_id(&self) -> String;

    /// Identifier for a generated-image record (8 hex chars).
    fn image_id(&self) -> String;
}

pub struct RandomIds;

impl IdSource for RandomIds {
    fn download_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    fn image_id(&self) -> String {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        id
    }
}

#[cfg(test)]
pub struct FixedIds {
    pub download: String,
    pub image: String,
}

#[cfg(test)]
impl IdSource for FixedIds {
    fn download_id(&self) -> String {
        self.download.clone()
    }

    fn image_id(&self) -> String {
        self.image.clone()
    }
}
