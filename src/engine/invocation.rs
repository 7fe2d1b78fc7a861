use super::EngineLayout;
use crate::{job::ConversionRequest, naming::OutputTarget};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const DEVICE_PDF: &str = "pdfwrite";
pub const DEVICE_PDF_OCR: &str = "pdfocr24";

const TEMP_VARS: [&str; 3] = ["TMPDIR", "TMP", "TEMP"];
const OCR_DATA_VAR: &str = "TESSDATA_PREFIX";

/// A fully resolved converter command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInvocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Applied in order; later entries win.
    pub env: Vec<(String, OsString)>,
    pub stdin: bool,
}

impl EngineInvocation {
    pub fn build(
        layout: &EngineLayout,
        req: &ConversionRequest,
        target: &OutputTarget,
        scratch_dir: &Path,
    ) -> Self {
        let engines = &layout.engines;
        let ocr_lang = req.ocr.language.as_deref().filter(|l| !l.is_empty());
        let ocr_device = ocr_lang.is_some() && !req.ocr.text_only;

        let mut args: Vec<OsString> = vec![
            "-dNOPAUSE".into(),
            "-dBATCH".into(),
            format!("-sPAPERSIZE={}", engines.paper_size).into(),
        ];
        if engines.fixed_media {
            args.push("-dFIXEDMEDIA".into());
        }
        let device = if ocr_device { DEVICE_PDF_OCR } else { DEVICE_PDF };
        args.push(format!("-sDEVICE={device}").into());
        if let Some(lang) = ocr_lang {
            args.push(format!("-sOCRLanguage={lang}").into());
        }
        if req.ocr.text_only {
            args.push("-sUseOCR=Always".into());
        }
        args.push("-o".into());
        args.push(target.path().into());
        args.push(req.input.clone().into());

        let mut env: Vec<(String, OsString)> = engines
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.into()))
            .collect();
        for var in TEMP_VARS {
            env.push((var.to_string(), scratch_dir.into()));
        }
        env.push((OCR_DATA_VAR.to_string(), layout.ocr_data_dir().into()));

        Self {
            program: layout.locate(req.language),
            args,
            env,
            stdin: req.reads_stdin(),
        }
    }

    pub fn env_var(&self, key: &str) -> Option<&OsString> {
        self.env.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}
