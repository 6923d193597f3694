//! English and Indonesian user-facing strings.

use crate::storage::{LocalStore, LANGUAGE_KEY};
use crate::error::{CompressioError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    En,
    #[default]
    Id,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Id => "id",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "en" => Some(Language::En),
            "id" => Some(Language::Id),
            _ => None,
        }
    }

    /// Preferred language from the local store, Indonesian when unset
    pub fn load(store: &LocalStore) -> Self {
        store
            .get_item(LANGUAGE_KEY)
            .and_then(|code| Self::from_code(&code))
            .unwrap_or_default()
    }

    pub fn save(&self, store: &LocalStore) -> Result<()> {
        store.set_item(LANGUAGE_KEY, self.code())
    }

    pub fn parse(code: &str) -> Result<Self> {
        Self::from_code(code).ok_or_else(|| {
            CompressioError::Validation(format!("Unsupported language '{}', use en or id", code))
        })
    }

    pub fn messages(&self) -> &'static Messages {
        match self {
            Language::En => &EN,
            Language::Id => &ID,
        }
    }
}

#[derive(Debug)]
pub struct Messages {
    pub recent_compressions: &'static str,
    pub file_name: &'static str,
    pub original_size: &'static str,
    pub compressed_size: &'static str,
    pub ratio: &'static str,
    pub method: &'static str,
    pub date: &'static str,
    pub no_history: &'static str,
    pub compressing: &'static str,
    pub compression_success: &'static str,
    pub compression_failed: &'static str,
    pub download_success: &'static str,
    pub download_failed: &'static str,
    pub invalid_file_type: &'static str,
    pub limit_reached: &'static str,
    pub no_file_selected: &'static str,
    pub busy: &'static str,
    pub login_success: &'static str,
    pub logout_success: &'static str,
}

static EN: Messages = Messages {
    recent_compressions: "Recent Compressions",
    file_name: "File Name",
    original_size: "Original Size",
    compressed_size: "Compressed Size",
    ratio: "Ratio",
    method: "Method",
    date: "Date",
    no_history: "No compressions yet.",
    compressing: "Compressing",
    compression_success: "File compressed successfully!",
    compression_failed: "Compression failed. Please try again.",
    download_success: "File downloaded successfully!",
    download_failed: "Download failed. Please try again.",
    invalid_file_type: "Invalid file type. Please upload a supported file.",
    limit_reached: "Compression limit reached. Please login for unlimited access.",
    no_file_selected: "Please select a file",
    busy: "A file is already being processed",
    login_success: "Successfully logged in!",
    logout_success: "Successfully logged out!",
};

static ID: Messages = Messages {
    recent_compressions: "Kompresi Terbaru",
    file_name: "Nama File",
    original_size: "Ukuran Asli",
    compressed_size: "Ukuran Terkompresi",
    ratio: "Rasio",
    method: "Metode",
    date: "Tanggal",
    no_history: "Belum ada kompresi.",
    compressing: "Mengompres",
    compression_success: "File berhasil dikompres!",
    compression_failed: "Kompresi gagal. Silakan coba lagi.",
    download_success: "File berhasil diunduh!",
    download_failed: "Unduhan gagal. Silakan coba lagi.",
    invalid_file_type: "Tipe file tidak valid. Silakan unggah file yang didukung.",
    limit_reached: "Batas kompresi tercapai. Silakan masuk untuk akses tak terbatas.",
    no_file_selected: "Silakan pilih file",
    busy: "Sebuah file sedang diproses",
    login_success: "Berhasil masuk!",
    logout_success: "Berhasil keluar!",
};

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_language_defaults_to_indonesian() {
        let temp_dir = tempdir().unwrap();
        let store = LocalStore::open(temp_dir.path().join("store.json")).unwrap();
        assert_eq!(Language::load(&store), Language::Id);

        Language::En.save(&store).unwrap();
        assert_eq!(Language::load(&store), Language::En);
        assert_eq!(Language::load(&store).messages().ratio, "Ratio");
    }

    #[test]
    fn test_unknown_codes() {
        assert_eq!(Language::from_code(" EN "), Some(Language::En));
        assert!(Language::parse("fr").is_err());
    }
}
