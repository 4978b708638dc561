//! Tests for ImportPipeline
//!
//! Tests cover:
//! - Nested and flat input shapes
//! - Collected validation errors and whole-batch rejection
//! - Fresh ids, re-linked parents and type references
//! - Duplicate skipping with merge of children
//! - Replace mode and attachment checks

#[cfg(test)]
mod tests {
    use crate::models::Node;
    use crate::services::import_pipeline::*;
    use crate::services::HierarchyIndex;
    use serde_json::json;
    use std::collections::HashSet;

    fn catalog() -> HierarchyIndex {
        HierarchyIndex::build(&[
            Node::with_id("r1", "r1", "Catalog", "r1"),
            Node::with_id("m1", "r1", "Sales", "module"),
            Node::with_id("t1", "m1", "Invoice", "table"),
        ])
    }

    fn run(input: &str, options: ImportOptions) -> ImportResult {
        ImportPipeline::new(options).run(input, &catalog())
    }

    mod shapes {
        use super::*;

        #[test]
        fn test_nested_object_under_attachment() {
            let input = json!({
                "Id": "a",
                "Name": "Customer",
                "TypeRef": "table",
                "Children": [
                    {"Id": "b", "Name": "Name", "TypeRef": "field"},
                    {"Id": "c", "Name": "Email", "TypeRef": "field"}
                ]
            })
            .to_string();

            let result = run(&input, ImportOptions::under("m1"));
            assert!(result.success, "{:?}", result.errors);
            assert_eq!(result.imported_count, 3);
            assert_eq!(result.stage, ImportStage::DuplicateCheck);

            let root = &result.records[0];
            assert_eq!(root.parent_id, "m1");
            assert_ne!(root.id, "a");
            assert_eq!(result.records[1].parent_id, root.id);
            assert_eq!(result.records[2].parent_id, root.id);
        }

        #[test]
        fn test_top_level_import_creates_roots() {
            let input = json!([{"id": "x", "name": "Standalone"}]).to_string();

            let result = run(&input, ImportOptions::default());
            assert!(result.success);
            let root = &result.records[0];
            assert!(root.is_root());
            // Missing type reference makes the node self-classifying
            assert_eq!(root.type_ref, root.id);
        }

        #[test]
        fn test_flat_records_are_nested_by_parent() {
            let input = json!([
                {"Id": "f2", "ParentId": "f1", "Name": "Child", "PayanarssTypeId": "f1"},
                {"Id": "f1", "ParentId": "f1", "Name": "Parent", "PayanarssTypeId": "f1"},
                {"Id": "f3", "ParentId": "f2", "Name": "Grandchild", "PayanarssTypeId": "f1"}
            ])
            .to_string();

            let result = run(&input, ImportOptions::under("r1"));
            assert!(result.success, "{:?}", result.errors);
            let names: Vec<&str> = result.records.iter().map(|r| r.name.as_str()).collect();
            assert_eq!(names, vec!["Parent", "Child", "Grandchild"]);

            let parent_id = result.records[0].id.clone();
            assert_eq!(result.records[0].parent_id, "r1");
            assert_eq!(result.records[1].parent_id, parent_id);
            // In-batch type references follow the remap
            assert!(result.records.iter().all(|r| r.type_ref == parent_id));
        }

        #[test]
        fn test_flat_cycle_is_rejected() {
            let input = json!([
                {"Id": "a", "ParentId": "b", "Name": "A"},
                {"Id": "b", "ParentId": "a", "Name": "B"}
            ])
            .to_string();

            let result = run(&input, ImportOptions::under("r1"));
            assert!(!result.success);
            assert_eq!(result.stage, ImportStage::Rejected);
            assert!(result.errors.iter().all(|e| e.contains("cycle")));
        }

        #[test]
        fn test_external_type_reference_kept() {
            let input = json!({"Id": "a", "Name": "Total", "TypeRef": "field"}).to_string();
            let result = run(&input, ImportOptions::under("t1"));
            assert_eq!(result.records[0].type_ref, "field");
        }
    }

    mod validation {
        use super::*;

        #[test]
        fn test_one_invalid_node_rejects_whole_batch() {
            let mut nodes: Vec<serde_json::Value> = (0..100)
                .map(|i| json!({"Id": format!("n{}", i), "Name": format!("Node {}", i)}))
                .collect();
            nodes.insert(37, json!({"Id": "bad"}));

            let input = serde_json::Value::Array(nodes).to_string();
            let result = run(&input, ImportOptions::under("r1"));
            assert!(!result.success);
            assert_eq!(result.imported_count, 0);
            assert!(result.records.is_empty());
            assert_eq!(result.errors.len(), 1);
            assert!(result.errors[0].contains("$[37]"));
            assert!(result.errors[0].contains("Name"));
        }

        #[test]
        fn test_all_defects_collected_with_paths() {
            let input = json!({
                "Id": "a",
                "Name": "Parent",
                "Children": [
                    {"Name": "no id"},
                    {"Id": "", "Name": "blank id"},
                    {"Id": "c", "Name": "", "Attributes": "oops"}
                ]
            })
            .to_string();

            let result = run(&input, ImportOptions::default());
            assert!(!result.success);
            assert_eq!(result.errors.len(), 4, "{:?}", result.errors);
            assert!(result.errors[0].starts_with("$.Children[0]"));
            assert!(result.errors.iter().any(|e| e.contains("Attributes")));
        }

        #[test]
        fn test_repeated_source_id_rejected() {
            let input = json!([
                {"Id": "a", "Name": "One"},
                {"Id": "a", "Name": "Two"}
            ])
            .to_string();

            let result = run(&input, ImportOptions::default());
            assert!(!result.success);
            assert!(result.errors[0].contains("duplicate Id 'a'"));
        }

        #[test]
        fn test_children_must_be_array() {
            let input = json!({"Id": "a", "Name": "A", "children": {"Id": "b"}}).to_string();
            let result = run(&input, ImportOptions::default());
            assert!(!result.success);
            assert!(result.errors[0].contains("Children"));
        }

        #[test]
        fn test_malformed_and_empty_input() {
            assert!(!run("{not json", ImportOptions::default()).success);
            assert!(!run("42", ImportOptions::default()).success);

            let empty = run("[]", ImportOptions::default());
            assert!(!empty.success);
            assert!(empty.errors[0].contains("Nothing to import"));
        }

        #[test]
        fn test_missing_attachment_point_rejected() {
            let input = json!({"Id": "a", "Name": "A"}).to_string();
            let result = run(&input, ImportOptions::under("ghost"));
            assert!(!result.success);
            assert!(result.errors[0].contains("ghost"));
        }
    }

    mod duplicates {
        use super::*;

        #[test]
        fn test_duplicate_of_existing_node_skipped_with_warning() {
            let input = json!([
                {"Id": "x", "Name": "invoice", "TypeRef": "table"},
                {"Id": "y", "Name": "Payment", "TypeRef": "table"},
                {"Id": "z", "Name": "Refund", "TypeRef": "table"}
            ])
            .to_string();

            let result = run(&input, ImportOptions::under("m1"));
            assert!(result.success);
            assert_eq!(result.imported_count, 2);
            assert_eq!(result.warnings.len(), 1);
            assert!(result.warnings[0].contains("'invoice'"));
        }

        #[test]
        fn test_children_of_skipped_duplicate_merge_into_existing() {
            let input = json!({
                "Id": "x",
                "Name": "Invoice",
                "TypeRef": "table",
                "Children": [{"Id": "y", "Name": "Due Date", "TypeRef": "field"}]
            })
            .to_string();

            let result = run(&input, ImportOptions::under("m1"));
            assert!(result.success);
            assert_eq!(result.imported_count, 1);
            assert_eq!(result.records[0].parent_id, "t1");
        }

        #[test]
        fn test_type_ref_to_skipped_duplicate_is_matched_against_catalog() {
            let index = HierarchyIndex::build(&[
                Node::with_id("r1", "r1", "Catalog", "r1"),
                Node::with_id("tt", "r1", "Table", "r1"),
                Node::with_id("t1", "r1", "Invoice", "tt"),
            ]);
            let input = json!([
                {"Id": "a", "Name": "Table", "TypeRef": "r1"},
                {"Id": "b", "Name": "Invoice", "TypeRef": "a"}
            ])
            .to_string();

            let result = ImportPipeline::new(ImportOptions::under("r1")).run(&input, &index);
            assert!(!result.success);
            assert!(result.errors[0].contains("all 2 records already exist"));
            assert_eq!(result.warnings.len(), 2);
        }

        #[test]
        fn test_type_ref_rewritten_to_surviving_node() {
            let index = HierarchyIndex::build(&[
                Node::with_id("r1", "r1", "Catalog", "r1"),
                Node::with_id("tt", "r1", "Table", "r1"),
            ]);
            let input = json!([
                {"Id": "a", "Name": "Table", "TypeRef": "r1"},
                {"Id": "b", "Name": "Payment", "TypeRef": "a"}
            ])
            .to_string();

            let result = ImportPipeline::new(ImportOptions::under("r1")).run(&input, &index);
            assert!(result.success);
            assert_eq!(result.imported_count, 1);
            assert_eq!(result.records[0].type_ref, "tt");
        }

        #[test]
        fn test_repeats_within_batch_skipped() {
            let input = json!([
                {"Id": "a", "Name": "Tag", "TypeRef": "t"},
                {"Id": "b", "Name": "TAG", "TypeRef": "t"}
            ])
            .to_string();

            let result = run(&input, ImportOptions::under("r1"));
            assert_eq!(result.imported_count, 1);
            assert!(result.warnings[0].contains("within the import"));
        }

        #[test]
        fn test_all_duplicates_is_nothing_to_import() {
            let input = json!({"Id": "x", "Name": "Sales", "TypeRef": "module"}).to_string();
            let result = run(&input, ImportOptions::under("r1"));
            assert!(!result.success);
            assert!(result.errors[0].contains("Nothing to import"));
            assert_eq!(result.warnings.len(), 1);
        }

        #[test]
        fn test_custom_signature() {
            fn by_name_only(node: &Node) -> String {
                node.name.to_lowercase()
            }
            let input = json!({"Id": "x", "Name": "Catalog", "TypeRef": "anything"}).to_string();

            let default = run(&input, ImportOptions::under("t1"));
            assert!(default.success);

            let custom = run(&input, ImportOptions::under("t1").with_signature(by_name_only));
            assert!(!custom.success);
        }
    }

    #[test]
    fn test_fresh_ids_never_collide_with_catalog() {
        let input = json!([
            {"Id": "r1", "Name": "Shadow root"},
            {"Id": "m1", "Name": "Shadow module"}
        ])
        .to_string();
        let existing = catalog();

        let result = ImportPipeline::new(ImportOptions::under("r1")).run(&input, &existing);
        assert!(result.success);
        let ids: HashSet<&str> = result.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(|id| !existing.contains(id)));
    }

    #[test]
    fn test_replace_children_lists_removed_descendants() {
        let input = json!({"Id": "x", "Name": "Ledger", "TypeRef": "table"}).to_string();
        let result = run(
            &input,
            ImportOptions::under("m1").with_mode(ImportMode::ReplaceChildren),
        );

        assert!(result.success);
        assert_eq!(result.replaced_ids, vec!["t1".to_string()]);
    }

    #[test]
    fn test_replaced_nodes_do_not_count_as_duplicates() {
        let input = json!({"Id": "x", "Name": "Invoice", "TypeRef": "table"}).to_string();
        let result = run(
            &input,
            ImportOptions::under("m1").with_mode(ImportMode::ReplaceChildren),
        );
        assert!(result.success);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_large_import_warning() {
        let nodes: Vec<serde_json::Value> = (0..6)
            .map(|i| json!({"Id": format!("n{}", i), "Name": format!("Node {}", i)}))
            .collect();
        let result = run(
            &serde_json::Value::Array(nodes).to_string(),
            ImportOptions::under("r1").with_large_import_threshold(5),
        );

        assert!(result.success);
        assert!(result.warnings.iter().any(|w| w.contains("Large import")));
    }
}
