//! Language context variables: facts about the code around the cursor.
//!
//! A language's [`VariableProvider`] answers these from a real syntax model.
//! When none is registered, [`DefaultProvider`] answers the few it can read
//! off the raw text.

use std::sync::LazyLock;

use color_eyre::eyre::{Result, bail};
use itertools::Itertools;
use regex::Regex;

use crate::collab::{LanguageScoped, TestPromptContext, VariableProvider};
use crate::compiler::EditorContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PsiVariable {
    CurrentClassName,
    CurrentClassCode,
    CurrentMethodName,
    CurrentMethodCode,
    Imports,
    RelatedClasses,
    SimilarTestCase,
    IsNeedCreateFile,
    TargetTestFileName,
    UnderTestMethodCode,
    FrameworkContext,
    CodeSmell,
    MethodCaller,
    CalledMethod,
    SimilarCode,
    Structure,
}

impl PsiVariable {
    pub const ALL: [PsiVariable; 16] = [
        PsiVariable::CurrentClassName,
        PsiVariable::CurrentClassCode,
        PsiVariable::CurrentMethodName,
        PsiVariable::CurrentMethodCode,
        PsiVariable::Imports,
        PsiVariable::RelatedClasses,
        PsiVariable::SimilarTestCase,
        PsiVariable::IsNeedCreateFile,
        PsiVariable::TargetTestFileName,
        PsiVariable::UnderTestMethodCode,
        PsiVariable::FrameworkContext,
        PsiVariable::CodeSmell,
        PsiVariable::MethodCaller,
        PsiVariable::CalledMethod,
        PsiVariable::SimilarCode,
        PsiVariable::Structure,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PsiVariable::CurrentClassName => "currentClassName",
            PsiVariable::CurrentClassCode => "currentClassCode",
            PsiVariable::CurrentMethodName => "currentMethodName",
            PsiVariable::CurrentMethodCode => "currentMethodCode",
            PsiVariable::Imports => "imports",
            PsiVariable::RelatedClasses => "relatedClasses",
            PsiVariable::SimilarTestCase => "similarTestCase",
            PsiVariable::IsNeedCreateFile => "isNeedCreateFile",
            PsiVariable::TargetTestFileName => "targetTestFileName",
            PsiVariable::UnderTestMethodCode => "underTestMethodCode",
            PsiVariable::FrameworkContext => "frameworkContext",
            PsiVariable::CodeSmell => "codeSmell",
            PsiVariable::MethodCaller => "methodCaller",
            PsiVariable::CalledMethod => "calledMethod",
            PsiVariable::SimilarCode => "similarCode",
            PsiVariable::Structure => "structure",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == name)
    }

    /// Whether the testing service knows this variable.
    pub fn is_test_related(self) -> bool {
        matches!(
            self,
            PsiVariable::RelatedClasses
                | PsiVariable::SimilarTestCase
                | PsiVariable::IsNeedCreateFile
                | PsiVariable::TargetTestFileName
                | PsiVariable::FrameworkContext
        )
    }

    /// Read this variable out of a test prompt context, if it carries it.
    pub fn from_test_context(self, context: &TestPromptContext) -> Option<String> {
        match self {
            PsiVariable::IsNeedCreateFile => Some(context.is_new_file.to_string()),
            PsiVariable::TargetTestFileName => context
                .test_file
                .as_ref()
                .map(|f| f.name().to_string())
                .or_else(|| context.test_class_name.clone()),
            PsiVariable::SimilarTestCase => context.similar_test_case.clone(),
            PsiVariable::FrameworkContext => Some(context.framework.join("\n")),
            PsiVariable::RelatedClasses => {
                Some(context.related_classes.iter().map(|c| c.text.as_str()).join("\n\n"))
            }
            _ => None,
        }
    }
}

/// Reads what it can from the editor text alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProvider;

static IMPORT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\s*(import\s|use\s|from\s+\S+\s+import\s|#include\s|require\b|using\s)").ok()
});

static CLASS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(?:class|struct|interface|enum|trait|object)\s+([A-Za-z_]\w*)").ok());

static METHOD: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(?:fn|def|fun|func|function)\s+([A-Za-z_]\w*)").ok());

impl LanguageScoped for DefaultProvider {
    fn is_applicable(&self, _language: &str) -> bool {
        true
    }
}

impl VariableProvider for DefaultProvider {
    fn resolve(&self, variable: PsiVariable, context: &EditorContext) -> Result<String> {
        let text = context.text.as_deref().unwrap_or_default();
        let before = context.before_cursor().unwrap_or(text);
        match variable {
            PsiVariable::Imports => Ok(match IMPORT.as_ref() {
                Some(import) => text.lines().filter(|l| import.is_match(l)).join("\n"),
                None => String::new(),
            }),
            PsiVariable::CurrentClassName => Ok(last_name(CLASS.as_ref(), before)),
            PsiVariable::CurrentMethodName => Ok(last_name(METHOD.as_ref(), before)),
            other => bail!("`{}` needs a language provider", other.name()),
        }
    }
}

fn last_name(regex: Option<&Regex>, text: &str) -> String {
    regex
        .and_then(|r| r.captures_iter(text).last())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}
