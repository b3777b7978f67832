//! Display strings for the two supported languages.
//!
//! The language is picked once at startup from `LANG`. Entries that differ
//! between the Standard and Pro editions are looked up per edition.

use crate::config::Edition;
use crate::dispatch::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    Zh,
    En,
}

impl Lang {
    /// Chinese unless `LANG` is set to something that doesn't mention `zh`.
    pub fn from_locale(locale: &str) -> Self {
        if locale.is_empty() || locale.to_lowercase().contains("zh") {
            Lang::Zh
        } else {
            Lang::En
        }
    }

    pub fn from_env() -> Self {
        Self::from_locale(&std::env::var("LANG").unwrap_or_default())
    }

    fn index(self) -> usize {
        match self {
            Lang::Zh => 0,
            Lang::En => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Title,
    Header,
    Theme,
    Cleanup,
    Select,
    Settings,
    SecurityFrame,
    Integrity,
    CveScan,
    EngineeringFrame,
    Engine,
    MultiArch,
    GithubAssets,
    Start,
    Ready,
    CleanStart,
    CleanDone,
    ScanStart,
    ScanDone,
    AssetsStart,
    AssetsDone,
    Loaded,
    TaskStart,
    Compiling,
    Success,
    Failed,
    Fatal,
    Finished,
    EngineMissing,
    SelectFirst,
    Checking,
    Running,
    Dismiss,
}

/// Table lookup. Placeholders are written `{}` and filled by [`tf`].
pub fn t(lang: Lang, edition: Edition, key: Key) -> &'static str {
    entry(edition, key)[lang.index()]
}

/// Lookup with positional `{}` substitution.
pub fn tf(lang: Lang, edition: Edition, key: Key, args: &[&str]) -> String {
    let mut out = t(lang, edition, key).to_string();
    for arg in args {
        out = out.replacen("{}", arg, 1);
    }
    out
}

fn entry(edition: Edition, key: Key) -> [&'static str; 2] {
    let pro = edition.is_pro();
    match key {
        Key::Title if pro => [
            "Python 分发大师 (Pro Suite) v10.2 Master Build",
            "Python Distribution Pro Suite v10.2 Master Build",
        ],
        Key::Title => [
            "Python 分发大师 (Standard) v10.2 Master Build",
            "Python Distribution Master (Standard) v10.2",
        ],
        Key::Header if pro => ["📦 Python 分发大师 Pro", "📦 Python Distribution Pro"],
        Key::Header => ["📦 Python 分发大师 [标准版]", "📦 Python Distribution [Standard]"],
        Key::Theme if pro => ["🌓 切换主题", "🌓 Toggle Theme"],
        Key::Theme => ["🌓 主题", "🌓 Theme"],
        Key::Cleanup if pro => ["🧹 深度清理", "🧹 Deep Cleanup"],
        Key::Cleanup => ["🧹 清理", "🧹 Cleanup"],
        Key::Select => ["📁 选择脚本", "📁 Select Script"],
        Key::Settings => [" 基础设置 ", " Basic Settings "],
        Key::SecurityFrame => [" 🛡️ 安全合规 (Security & Compliance) ", " 🛡️ Security & Compliance "],
        Key::Integrity => ["完整性审计与自修复", "Integrity Audit & Self-Healing"],
        Key::CveScan => ["CVE 漏洞预警扫描", "CVE Vulnerability Shield"],
        Key::EngineeringFrame => [" ⚙️ 编译与分发 (Engineering) ", " ⚙️ Engineering & Dist "],
        Key::Engine if pro => ["构建引擎:", "Build Engine:"],
        Key::Engine => ["编译引擎:", "Build Engine:"],
        Key::MultiArch if pro => ["多架构编译 (X64/ARM64)", "Multi-Arch (X64/ARM64)"],
        Key::MultiArch => ["多架构兼容 (X64/ARM64)", "Multi-Arch (X64/ARM64)"],
        Key::GithubAssets => ["同步生成 GitHub 资产", "Sync GitHub Assets"],
        Key::Start if pro => ["🚀 启动构建流程", "🚀 Start Build Process"],
        Key::Start => ["🚀 开始转换 (不含加密项)", "🚀 Start Conversion (No Encryption)"],
        Key::Ready if pro => [
            "系统就绪。当前模式：工业级分行与安全配置。",
            "System ready. Mode: Professional & Secure Distribution.",
        ],
        Key::Ready => ["系统就绪。", "System ready."],
        Key::CleanStart if pro => ["🧹 [系统维护] 正在开启一键深度清理...", "🧹 [System] Starting deep cleanup..."],
        Key::CleanStart => ["🧹 [系统维护] 正在清理构建缓存...", "🧹 [System] Cleaning build cache..."],
        Key::CleanDone if pro => ["✓ 清理完成，共处理 {} 个冗余资产。", "✓ Cleanup done, {} assets processed."],
        Key::CleanDone => ["✓ 清理完成，处理了 {} 个项目。", "✓ Cleanup done, processed {} items."],
        Key::ScanStart => [
            "🛡️ [安全预检] 正在启动 CVE 实时漏洞扫描器...",
            "🛡️ [Security] Starting CVE vulnerability scan...",
        ],
        Key::ScanDone => [
            "✓ 未通过本地依赖库发现中高危已知漏洞。",
            "✓ No high-risk vulnerabilities found in dependencies.",
        ],
        Key::AssetsStart => [
            "🐙 [GitHub 助手] 正在生成标准开源项目资产...",
            "🐙 [GitHub] Generating standard repo assets...",
        ],
        Key::AssetsDone => ["✓ 资产生成完毕。", "✓ Assets generated."],
        Key::Loaded if pro => ["✓ 已载入 {} 个脚本方案。", "✓ Loaded {} script blueprints."],
        Key::Loaded => ["已导入 {} 个文件。", "Imported {} files."],
        Key::TaskStart if pro => ["正在执行分发任务: {}", "Executing distribution task: {}"],
        Key::TaskStart => ["➤ 正在处理: {}", "➤ Processing: {}"],
        Key::Compiling => ["➤ 正在通过 {} 编译器进行封装...", "➤ Encapsulating via {} compiler..."],
        Key::Success if pro => ["✓ {} 构建成功！", "✓ {} Build success!"],
        Key::Success => ["✓ {} 成功！", "✓ {} Success!"],
        Key::Failed if pro => ["✗ {} 构建失败。", "✗ {} Build failed."],
        Key::Failed => ["✗ {} 失败。", "✗ {} Failed."],
        Key::Fatal if pro => ["✗ 致命故障: {}", "✗ Fatal crash: {}"],
        Key::Fatal => ["出错: {}", "Error: {}"],
        Key::Finished if pro => ["所有分发任务已结束。", "All distribution tasks finished."],
        Key::Finished => ["所有任务已处理完毕。", "All tasks completed."],
        Key::EngineMissing => [
            "未检测到 {} 模块。\n请在终端运行: pip install {}",
            "{} module not found.\nPlease run: pip install {}",
        ],
        Key::SelectFirst if pro => ["请先选择脚本。", "Please select a script first."],
        Key::SelectFirst => ["请选择脚本。", "Please select a script."],
        Key::Checking => ["正在检测构建引擎...", "Checking build engine..."],
        Key::Running => ["构建中", "Building"],
        Key::Dismiss => ["关闭", "Dismiss"],
    }
}

/// Bilingual strings for the edition chooser, shown before a language
/// table is relevant.
pub mod launcher {
    pub const TITLE: &str = "Python Distribution Suite v10.2 Master Build";
    pub const HEADER: &str = "PYTHON DISTRIBUTION SUITE / Python 分发大师";
    pub const SUBHEADER: &str = "v10.2 Master Build / 10.2 大师版";
    pub const PROMPT: &str = "请选择您要启动的版本 / Select Edition:";
    pub const STANDARD: &str = "📦 标准版 (Standard Edition)\n精简核心 | 无加密 | 快速分发\nCore Logic | No Encryption | Fast Distribution";
    pub const PRO: &str = "🛡️ 专业版 (Professional Edition)\n完全特性 | 内存保护 | CVE 审计\nFull Features | Memory Guard | CVE Audit";
}

/// Log line reporting how one file ended.
pub fn outcome_line(lang: Lang, edition: Edition, file_name: &str, outcome: &Outcome) -> String {
    match outcome {
        Outcome::Success => tf(lang, edition, Key::Success, &[file_name]),
        Outcome::Failed { .. } => tf(lang, edition, Key::Failed, &[file_name]),
        Outcome::Fatal(message) => tf(lang, edition, Key::Fatal, &[message]),
    }
}

/// Header logged before a file is processed.
pub fn task_header(lang: Lang, edition: Edition, file_name: &str) -> String {
    let line = tf(lang, edition, Key::TaskStart, &[file_name]);
    if edition.is_pro() {
        let rule = "━".repeat(60);
        format!("\n{rule}\n{line}\n{rule}")
    } else {
        format!("\n{line}")
    }
}
