//! End-to-end compilation tests: markup, attributes, control flow, assets and streaming.

#[cfg(test)]
mod tests {
    use crate::assets::AssetBundle;
    use crate::compiler::{CompilationResult, Compiler};
    use crate::config::CompilerConfig;
    use crate::error::CompilerError;
    use crate::resolve::MemoryLoader;
    use serde_json::{json, Map, Value};
    use std::sync::Arc;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn loader(files: &[(&str, &str)]) -> MemoryLoader {
        files
            .iter()
            .fold(MemoryLoader::new(), |loader, (path, content)| {
                loader.with_file(path, content)
            })
    }

    fn compiler(files: &[(&str, &str)], input: &str) -> Compiler {
        let mut compiler = Compiler::default();
        compiler.set_source_loader(Arc::new(loader(files)));
        compiler.set_input_content(input, None);
        compiler.define_components("components/**/*.webc").unwrap();
        compiler
    }

    fn compile_with(files: &[(&str, &str)], input: &str, globals: Value) -> CompilationResult {
        let mut compiler = compiler(files, input);
        compiler.set_global_data(object(globals));
        compiler.compile().unwrap()
    }

    fn render(input: &str, globals: Value) -> String {
        compile_with(&[], input, globals).markup
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // MARKUP & ATTRIBUTES
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_plain_markup_passes_through() {
        assert_eq!(
            render(r#"<p class="a">Fish &amp; chips</p>"#, json!({})),
            r#"<p class="a">Fish &amp; chips</p>"#
        );
    }

    #[test]
    fn test_full_document_is_kept() {
        let markup = render(
            "<!doctype html><html><head><title>T</title></head><body><p>x</p></body></html>",
            json!({}),
        );
        assert_eq!(
            markup,
            "<!doctype html><html><head><title>T</title></head><body><p>x</p></body></html>"
        );
    }

    #[test]
    fn test_dynamic_and_private_attributes() {
        let markup = render(
            r#"<a :href="url" @private="x" webc:ignored="1" title="t">Go</a>"#,
            json!({ "url": "/docs" }),
        );
        assert_eq!(markup, r#"<a href="/docs" title="t">Go</a>"#);
    }

    #[test]
    fn test_false_and_null_attributes_are_dropped() {
        let markup = render(
            r#"<input :disabled="off" :hidden="missing" :checked="on">"#,
            json!({ "off": false, "on": "" }),
        );
        assert_eq!(markup, "<input checked>");
    }

    #[test]
    fn test_attribute_values_are_escaped() {
        let markup = render(r#"<p :title="quote"></p>"#, json!({ "quote": "say \"hi\" & go" }));
        assert_eq!(markup, r#"<p title="say &quot;hi&quot; &amp; go"></p>"#);
    }

    #[test]
    fn test_content_directives() {
        let markup = render(
            r#"<p @text="snippet"></p><div @html="snippet"></div><span @raw="snippet"></span>"#,
            json!({ "snippet": "<b>x</b>" }),
        );
        assert_eq!(
            markup,
            "<p>&lt;b&gt;x&lt;/b&gt;</p><div><b>x</b></div><span><b>x</b></span>"
        );
    }

    #[test]
    fn test_html_directive_output_is_compiled() {
        let markup = render(
            r#"<div @html="snippet"></div>"#,
            json!({ "snippet": "<p webc:if=\"false\">no</p><p>yes</p>" }),
        );
        assert_eq!(markup, "<div><p>yes</p></div>");
    }

    #[test]
    fn test_attribute_spread() {
        let markup = render(
            r#"<img @attributes="extra" alt="a">"#,
            json!({ "extra": { "src": "/x.png", "width": 20 } }),
        );
        assert_eq!(markup, r#"<img alt="a" src="/x.png" width="20">"#);
    }

    #[test]
    fn test_class_values_accumulate() {
        let markup = render(
            r#"<p class="a b" :class="more"></p>"#,
            json!({ "more": "b c" }),
        );
        assert_eq!(markup, r#"<p class="a b c"></p>"#);
    }

    #[test]
    fn test_own_attributes_are_visible_to_content() {
        let markup = render(r#"<p @label="Hi" @text="label + '!'"></p>"#, json!({}));
        assert_eq!(markup, "<p>Hi!</p>");
    }

    #[test]
    fn test_helpers_are_callable() {
        let mut compiler = compiler(&[], r#"<p @text="shout(name)"></p>"#);
        compiler.set_global_data(object(json!({ "name": "ada" })));
        compiler.set_helper("shout", |args| {
            Ok(json!(format!(
                "{}!",
                args.first().and_then(Value::as_str).unwrap_or("").to_uppercase()
            )))
        });
        assert_eq!(compiler.compile().unwrap().markup, "<p>ADA!</p>");
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // CONTROL FLOW
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_loop_over_array() {
        let markup = render(
            r#"<ul><li webc:for="(item, i) of items" @text="i + ': ' + item"></li></ul>"#,
            json!({ "items": ["a", "b"] }),
        );
        assert_eq!(markup, "<ul><li>0: a</li><li>1: b</li></ul>");
    }

    #[test]
    fn test_empty_loop_renders_nothing() {
        let template = r#"<ul><li webc:for="item of items" @text="item"></li></ul>"#;
        assert_eq!(render(template, json!({ "items": [] })), "<ul></ul>");
        assert_eq!(render(template, json!({})), "<ul></ul>");
    }

    #[test]
    fn test_loop_over_object() {
        let markup = render(
            r#"<dl><dt webc:for="(key, value, i) in prices" @text="i + key + '=' + value"></dt></dl>"#,
            json!({ "prices": { "tea": 2, "cake": 4 } }),
        );
        assert_eq!(markup, "<dl><dt>0tea=2</dt><dt>1cake=4</dt></dl>");
    }

    #[test]
    fn test_loop_with_per_iteration_condition() {
        let markup = render(
            r#"<ol><li webc:for="n of nums" webc:if="n % 2 === 0" @text="n"></li></ol>"#,
            json!({ "nums": [1, 2, 3, 4] }),
        );
        assert_eq!(markup, "<ol><li>2</li><li>4</li></ol>");
    }

    #[test]
    fn test_nested_loops_shadow_outer_bindings() {
        let markup = render(
            r#"<div webc:for="row of rows"><i webc:for="row of row" @text="row"></i></div>"#,
            json!({ "rows": [["a", "b"], ["c"]] }),
        );
        assert_eq!(markup, "<div><i>a</i><i>b</i></div><div><i>c</i></div>");
    }

    #[test]
    fn test_exactly_one_branch_renders() {
        let template = r#"<p webc:if="n > 5">big</p><p webc:elseif="n > 1">mid</p><p webc:else>small</p>"#;
        assert_eq!(render(template, json!({ "n": 10 })), "<p>big</p>");
        assert_eq!(render(template, json!({ "n": 3 })), "<p>mid</p>");
        assert_eq!(render(template, json!({ "n": 0 })), "<p>small</p>");
    }

    #[test]
    fn test_comments_do_not_break_a_chain() {
        let markup = render(
            "<p webc:if=\"ok\">a</p><!-- note --><p webc:else>b</p>",
            json!({ "ok": false }),
        );
        assert_eq!(markup, "<!-- note --><p>b</p>");
    }

    #[test]
    fn test_failed_loop_source_reports_not_iterable() {
        let mut compiler = compiler(&[], r#"<i webc:for="x of count"></i>"#);
        compiler.set_global_data(object(json!({ "count": 3 })));
        assert!(matches!(
            compiler.compile(),
            Err(CompilerError::NotIterable { .. })
        ));
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // TEMPLATES, RAW MODE & TRANSFORMS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_template_tags() {
        assert_eq!(
            render("<template><b>x</b></template>", json!({})),
            "<template><b>x</b></template>"
        );
        assert_eq!(
            render("<template webc:nokeep><b>x</b></template>", json!({})),
            "<b>x</b>"
        );
    }

    #[test]
    fn test_raw_mode_skips_directives() {
        let markup = render(
            r#"<div webc:raw><p webc:if="false" :title="x">{{ y }}</p></div>"#,
            json!({}),
        );
        assert_eq!(
            markup,
            r#"<div><p webc:if="false" :title="x">{{ y }}</p></div>"#
        );
    }

    #[test]
    fn test_render_block_output_replaces_element() {
        let markup = render(
            "<script webc:type=\"render\">export default function () { return `<b>${this.name}</b>`; }</script><p>after</p>",
            json!({ "name": "Ada" }),
        );
        assert_eq!(markup, "<b>Ada</b><p>after</p>");
    }

    #[test]
    fn test_custom_transform() {
        let mut compiler = compiler(&[], r#"<pre webc:type="upper">shout</pre>"#);
        compiler.set_transform("upper", |content| Ok(content.to_uppercase()));
        assert_eq!(compiler.compile().unwrap().markup, "<pre>SHOUT</pre>");
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // ASSETS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_page_assets_are_collected() {
        let result = compile_with(
            &[],
            "<style>body { margin: 0 }</style><script>go()</script><p>x</p>",
            json!({}),
        );
        assert_eq!(result.markup, "<p>x</p>");
        assert_eq!(result.styles.fragments, vec!["body { margin: 0 }"]);
        assert_eq!(result.scripts.fragments, vec!["go()"]);
    }

    #[test]
    fn test_kept_and_external_scripts_stay_in_markup() {
        let result = compile_with(
            &[],
            r#"<p>x</p><script webc:keep>a()</script><script src="/b.js"></script><script type="text/template">c</script>"#,
            json!({}),
        );
        assert_eq!(
            result.markup,
            r#"<p>x</p><script>a()</script><script src="/b.js"></script><script type="text/template">c</script>"#
        );
        assert!(result.scripts.is_empty());
    }

    #[test]
    fn test_shared_fragments_are_deduplicated() {
        let files = [
            ("components/a-el.webc", "<style>p{}</style><p>a</p>"),
            ("components/b-el.webc", "<style>p{}</style><p>b</p>"),
        ];
        let result = compile_with(&files, "<a-el></a-el><b-el></b-el>", json!({}));
        assert_eq!(result.styles.fragments, vec!["p{}"]);
    }

    #[test]
    fn test_named_buckets() {
        let files = [(
            "components/x-el.webc",
            r#"<style>a{}</style><style webc:bucket="defer">b{}</style><p>x</p>"#,
        )];
        let result = compile_with(&files, "<x-el></x-el>", json!({}));
        assert_eq!(result.styles.fragments, vec!["a{}"]);
        assert_eq!(
            result.styles.buckets.get("defer"),
            Some(&vec!["b{}".to_string()])
        );
    }

    #[test]
    fn test_fragment_in_two_buckets_is_elevated() {
        let files = [
            ("components/a-el.webc", "<style>shared{}</style><p>a</p>"),
            (
                "components/b-el.webc",
                r#"<style webc:bucket="defer">shared{}</style><p>b</p>"#,
            ),
        ];
        let result = compile_with(&files, "<a-el></a-el><b-el></b-el>", json!({}));
        assert_eq!(result.styles.fragments, vec!["shared{}"]);
        assert!(result.styles.buckets.is_empty());
    }

    #[test]
    fn test_components_used_starts_with_input() {
        let files = [
            ("components/outer-el.webc", "<inner-el></inner-el>"),
            ("components/inner-el.webc", "<p>in</p>"),
        ];
        let result = compile_with(&files, "<outer-el></outer-el>", json!({}));
        assert_eq!(result.markup, "<p>in</p>");
        assert_eq!(
            result.components_used,
            vec![
                "<content>.webc".to_string(),
                "components/outer-el.webc".to_string(),
                "components/inner-el.webc".to_string(),
            ]
        );
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // RUNS & STREAMING
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_sequential_and_concurrent_runs_agree() {
        let files = [
            ("components/a-el.webc", "<style>a{}</style><p @text=\"label\"></p>"),
            ("components/b-el.webc", "<script>b()</script><slot></slot>"),
        ];
        let input = r#"<a-el label="1"></a-el><b-el><a-el label="2"></a-el></b-el><i webc:for="n of [1,2,3]" @text="n"></i>"#;

        let concurrent = compiler(&files, input).compile().unwrap();

        let mut config = CompilerConfig::default();
        config.concurrent = false;
        let mut sequential = Compiler::new(config);
        sequential.set_source_loader(Arc::new(loader(&files)));
        sequential.set_input_content(input, None);
        sequential.define_components("components/**/*.webc").unwrap();

        assert_eq!(concurrent, sequential.compile().unwrap());
    }

    #[test]
    fn test_stream_matches_compile() {
        let files = [
            ("components/a-el.webc", "<style>a{}</style><p>a</p>"),
            ("components/b-el.webc", "<script>b()</script><p>b</p>"),
        ];
        let input = "<h1>Title</h1><a-el></a-el><b-el></b-el>";
        let compiler = compiler(&files, input);

        let compiled = compiler.compile().unwrap();
        let streamed = compiler.stream().unwrap().collect().unwrap();

        assert_eq!(streamed.markup, compiled.markup);
        assert_eq!(streamed.css, compiled.styles.fragments);
        assert_eq!(streamed.js, compiled.scripts.fragments);
        assert_eq!(streamed.summary.components_used, compiled.components_used);
    }

    #[test]
    fn test_stream_reports_errors() {
        let compiler = compiler(&[], "<p webc:else>x</p>");
        let stream = compiler.stream().unwrap();
        assert!(matches!(
            stream.wait(),
            Err(CompilerError::OrphanedDirective { .. })
        ));
    }

    #[test]
    fn test_runs_do_not_share_state() {
        let files = [("components/x-el.webc", "<style>x{}</style><p>x</p>")];
        let compiler = compiler(&files, "<x-el></x-el>");
        let first = compiler.compile().unwrap();
        let second = compiler.compile().unwrap();
        assert_eq!(first, second);
        assert_ne!(first.styles, AssetBundle::default());
    }

    #[test]
    fn test_input_from_path() {
        let loader = MemoryLoader::new()
            .with_file("pages/index.webc", "<x-el></x-el>")
            .with_file("components/x-el.webc", "<p>x</p>");
        let mut compiler = Compiler::default();
        compiler.set_source_loader(Arc::new(loader));
        compiler.set_input_path("./pages/index.webc").unwrap();
        compiler.define_components("components/*.webc").unwrap();
        let result = compiler.compile().unwrap();
        assert_eq!(result.markup, "<p>x</p>");
        assert_eq!(result.components_used[0], "pages/index.webc");
    }
}
