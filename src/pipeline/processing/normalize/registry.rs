use std::collections::HashMap;

/// Column headers of the back-office shipment report and their canonical names
const REPORT_HEADERS: &[(&str, &str)] = &[
    ("Год", "year"),
    ("Месяц", "month"),
    ("Период", "period"),
    ("Линия", "line"),
    ("Дата отгрузки", "shipment_date"),
    ("Порт", "tracking_seaport"),
    ("Страна", "departure_country"),
    ("Отправитель", "shipper_name"),
    ("Получатель", "consignee_name"),
    ("Экспедитор", "expeditor"),
    ("Груз", "goods_name"),
    ("Тип контейнера", "container_type"),
    ("Размер контейнера", "container_size"),
    ("Кол-во контейнеров, шт.", "container_count"),
    ("Терминал", "terminal"),
    ("TEU", "teu"),
    ("Номер контейнера", "container_number"),
    ("КОД ТНВЭД", "tnved"),
    ("Группа груза по ТНВЭД", "tnved_group_id"),
    ("Наименование Группы", "tnved_group_name"),
    ("ИНН", "shipper_inn"),
    ("УНИ-компания", "shipper_name_unified"),
    ("Страна КОМПАНИИ", "consignee_country"),
    ("Направление", "direction"),
    ("Тип убытия", "departure_type"),
    ("Коносамент", "consignment"),
    ("Букинг", "booking"),
    ("Судно", "ship_name"),
    ("Рейс", "voyage"),
    ("Порожний", "is_empty"),
    ("Агент", "agent"),
    ("Станция УКП", "station_ukp"),
    ("Сборный груз", "combined_cargo"),
    ("Номер ГТД", "gtd_number"),
    ("Станция назначени (план)", "destination_station"),
    ("Вес нетто", "goods_weight_with_package"),
    ("Вес брутто", "goods_weight_brutto"),
];

/// Translation table from localized report headers to canonical field names
#[derive(Debug, Clone)]
pub struct HeaderRegistry {
    translations: HashMap<String, String>,
}

impl Default for HeaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderRegistry {
    /// Registry preloaded with the back-office report headers
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for (header, field) in REPORT_HEADERS {
            registry.register(header, field);
        }
        registry
    }

    pub fn empty() -> Self {
        Self {
            translations: HashMap::new(),
        }
    }

    pub fn register(&mut self, header: &str, field: &str) {
        self.translations
            .insert(header.trim().to_string(), field.to_string());
    }

    pub fn translate(&self, header: &str) -> Option<&str> {
        self.translations.get(header.trim()).map(String::as_str)
    }

    /// Target name for every column, `None` for columns to drop.
    ///
    /// Untranslated columns are kept only when nothing in the header row was
    /// translated, i.e. when the report already uses canonical names.
    pub fn plan_columns(&self, headers: &[String]) -> Vec<Option<String>> {
        let translated: Vec<Option<&str>> = headers.iter().map(|h| self.translate(h)).collect();
        let any_translated = translated.iter().any(Option::is_some);

        headers
            .iter()
            .zip(translated)
            .map(|(header, target)| match target {
                Some(field) => Some(field.to_string()),
                None if any_translated => None,
                None => Some(header.trim().to_string()),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.translations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.translations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_registry_translates_report_headers() {
        let registry = HeaderRegistry::new();
        assert_eq!(registry.translate("Линия"), Some("line"));
        assert_eq!(registry.translate(" Коносамент "), Some("consignment"));
        assert_eq!(registry.translate("Unknown"), None);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_untranslated_columns_dropped_when_report_is_localized() {
        let registry = HeaderRegistry::new();
        let plan = registry.plan_columns(&headers(&["Год", "Примечание", "Линия"]));
        assert_eq!(
            plan,
            vec![Some("year".to_string()), None, Some("line".to_string())]
        );
    }

    #[test]
    fn test_canonical_report_kept_as_is() {
        let registry = HeaderRegistry::new();
        let plan = registry.plan_columns(&headers(&["line", "consignment"]));
        assert_eq!(
            plan,
            vec![Some("line".to_string()), Some("consignment".to_string())]
        );
    }
}
