use convert_case::Case;
use convert_case::Casing;

pub fn format_id(base_name: &String, id: &Option<String>, name: &String) -> String {
    id.clone().unwrap_or(format!(
        "{}_{}",
        base_name,
        name.clone().to_case(Case::Snake)
    ))
}
