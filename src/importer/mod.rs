// ==========================================
// 肉鸡养殖台账系统 - 导入层
// ==========================================
// 职责: 外部文件导入物料目录
// 支持: Excel, CSV
// ==========================================

pub mod catalog_importer;
pub mod error;
pub mod file_parser;

// 重导出核心类型
pub use catalog_importer::{CatalogImportReport, CatalogImporter};
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, ExcelParser, FileParser, RawRow, UniversalFileParser};
