//! Failure modes. Every one of these must abort the run with a typed error instead of
//! producing partial output.
//!
//! - circular component usage, direct or through another component
//! - orphaned `webc:elseif` / `webc:else`
//! - conflicting content directives
//! - scope id collisions
//! - unresolvable references and unknown transforms

#[cfg(test)]
mod tests {
    use crate::compiler::Compiler;
    use crate::error::{CompilerError, ERR_CIRCULAR_DEPENDENCY, ERR_ORPHANED_DIRECTIVE};
    use crate::resolve::MemoryLoader;
    use std::sync::Arc;

    fn compile(files: &[(&str, &str)], input: &str) -> Result<String, CompilerError> {
        let loader = files
            .iter()
            .fold(MemoryLoader::new(), |loader, (path, content)| {
                loader.with_file(path, content)
            });
        let mut compiler = Compiler::default();
        compiler.set_source_loader(Arc::new(loader));
        compiler.set_input_content(input, Some("index.webc"));
        compiler.define_components("components/**/*.webc")?;
        compiler.compile().map(|result| result.markup)
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // CYCLES
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_self_use_is_circular() {
        let err = compile(
            &[("components/a-el.webc", "<p><a-el></a-el></p>")],
            "<a-el></a-el>",
        )
        .unwrap_err();
        assert_eq!(err.code(), ERR_CIRCULAR_DEPENDENCY);
        assert_eq!(
            err,
            CompilerError::CircularDependency {
                owner: "components/a-el.webc".to_string(),
                target: "components/a-el.webc".to_string(),
            }
        );
    }

    #[test]
    fn test_indirect_cycle_is_circular() {
        let err = compile(
            &[
                ("components/a-el.webc", "<b-el></b-el>"),
                ("components/b-el.webc", "<a-el></a-el>"),
            ],
            "<a-el></a-el>",
        )
        .unwrap_err();
        assert!(matches!(err, CompilerError::CircularDependency { .. }));
    }

    #[test]
    fn test_cycle_through_slot_fallback_is_circular() {
        let err = compile(
            &[("components/a-el.webc", "<slot><a-el></a-el></slot>")],
            "<a-el></a-el>",
        )
        .unwrap_err();
        assert!(matches!(err, CompilerError::CircularDependency { .. }));
    }

    #[test]
    fn test_repeated_use_is_not_a_cycle() {
        let markup = compile(
            &[
                ("components/a-el.webc", "<b-el></b-el><b-el></b-el>"),
                ("components/b-el.webc", "<i>b</i>"),
            ],
            "<a-el></a-el><b-el></b-el>",
        )
        .unwrap();
        assert_eq!(markup, "<i>b</i><i>b</i><i>b</i>");
    }

    #[test]
    fn test_component_passed_as_light_content_to_its_user() {
        // b uses a structurally; a is handed to b as light content from the page
        let markup = compile(
            &[
                ("components/a-el.webc", "<p>a</p>"),
                ("components/b-el.webc", "<a-el></a-el><slot></slot>"),
            ],
            "<b-el><a-el></a-el></b-el>",
        )
        .unwrap();
        assert_eq!(markup, "<p>a</p><p>a</p>");
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // DIRECTIVES
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_orphaned_else() {
        let err = compile(&[], "<p>x</p><p webc:else>y</p>").unwrap_err();
        assert_eq!(err.code(), ERR_ORPHANED_DIRECTIVE);
        assert_eq!(
            err,
            CompilerError::OrphanedDirective {
                directive: "webc:else".to_string(),
                file: "index.webc".to_string(),
            }
        );
    }

    #[test]
    fn test_orphaned_elseif_after_closed_chain() {
        let err = compile(
            &[],
            r#"<p webc:if="true">a</p><p webc:else>b</p><p webc:elseif="true">c</p>"#,
        )
        .unwrap_err();
        assert!(matches!(err, CompilerError::OrphanedDirective { ref directive, .. } if directive == "webc:elseif"));
    }

    #[test]
    fn test_orphan_inside_component_names_component_file() {
        let err = compile(
            &[("components/x-el.webc", "<p webc:elseif=\"true\">x</p>")],
            "<x-el></x-el>",
        )
        .unwrap_err();
        assert!(matches!(err, CompilerError::OrphanedDirective { ref file, .. } if file == "components/x-el.webc"));
    }

    #[test]
    fn test_conflicting_content_directives() {
        let err = compile(&[], r#"<p @html="a" @text="b"></p>"#).unwrap_err();
        assert!(matches!(
            err,
            CompilerError::ConflictingContentDirectives { ref tag, .. } if tag == "p"
        ));
    }

    #[test]
    fn test_invalid_loop_syntax() {
        let err = compile(&[], r#"<i webc:for="items"></i>"#).unwrap_err();
        assert!(matches!(err, CompilerError::Evaluation { .. }));
    }

    #[test]
    fn test_reserved_word_hint() {
        let err = compile(&[], r#"<p :title="class"></p>"#).unwrap_err();
        match err {
            CompilerError::Evaluation { message, .. } => {
                assert!(message.contains("webc.attributes.class"), "{}", message)
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // REGISTRY & RESOLUTION
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_scope_collision() {
        let err = compile(
            &[
                ("components/a-el.webc", r#"<style webc:scoped="dup">a{}</style>"#),
                ("components/b-el.webc", r#"<style webc:scoped="dup">b{}</style>"#),
            ],
            "<a-el></a-el>",
        )
        .unwrap_err();
        assert!(matches!(err, CompilerError::ScopeCollision { ref scope_id, .. } if scope_id == "dup"));
    }

    #[test]
    fn test_import_outside_project_root() {
        let err = compile(&[], r#"<x-el webc:import="../../secret.webc"></x-el>"#).unwrap_err();
        assert!(matches!(err, CompilerError::InvalidReference { .. }));
    }

    #[test]
    fn test_import_of_missing_file() {
        let err = compile(&[], r#"<x-el webc:import="missing.webc"></x-el>"#).unwrap_err();
        assert!(matches!(err, CompilerError::Io { ref path, .. } if path == "missing.webc"));
    }

    #[test]
    fn test_unknown_alias() {
        let err = compile(&[], r#"<x-el webc:import="nope:pkg"></x-el>"#).unwrap_err();
        assert!(matches!(err, CompilerError::InvalidReference { .. }));
    }

    #[test]
    fn test_unknown_transform() {
        let err = compile(&[], r#"<div webc:type="md">x</div>"#).unwrap_err();
        assert_eq!(
            err,
            CompilerError::UnknownTransform {
                name: "md".to_string(),
                file: "index.webc".to_string(),
            }
        );
    }

    #[test]
    fn test_failing_transform() {
        let mut compiler = Compiler::default();
        compiler.set_source_loader(Arc::new(MemoryLoader::new()));
        compiler.set_input_content(r#"<div webc:type="strict">x</div>"#, None);
        compiler.set_transform("strict", |_| Err("refused".to_string()));
        assert!(matches!(
            compiler.compile(),
            Err(CompilerError::Transform { ref message, .. }) if message == "refused"
        ));
    }

    #[test]
    fn test_failing_helper() {
        let mut compiler = Compiler::default();
        compiler.set_source_loader(Arc::new(MemoryLoader::new()));
        compiler.set_input_content(r#"<p @text="boom()"></p>"#, None);
        compiler.set_helper("boom", |_| Err("exploded".to_string()));
        let err = compiler.compile().unwrap_err();
        assert!(matches!(err, CompilerError::Evaluation { ref cause, .. } if cause.contains("exploded")));
    }

    #[test]
    fn test_missing_input() {
        let compiler = Compiler::default();
        assert!(matches!(
            compiler.compile(),
            Err(CompilerError::InvalidReference { .. })
        ));
    }

    #[test]
    fn test_input_path_outside_root() {
        let mut compiler = Compiler::default();
        assert!(compiler.set_input_path("../page.webc").is_err());
    }

    #[test]
    fn test_no_partial_output_on_late_error() {
        let mut compiler = Compiler::default();
        compiler.set_source_loader(Arc::new(MemoryLoader::new()));
        compiler.set_input_content("<p>fine</p><p webc:else>late</p>", None);
        assert!(compiler.compile().is_err());
    }
}
