use std::collections::HashMap;

/// 信号品种 -> 券商品种映射，未配置的品种原样使用
#[derive(Debug, Clone, Default)]
pub struct SymbolMapper {
    map: HashMap<String, String>,
}

impl SymbolMapper {
    pub fn new(map: &HashMap<String, String>) -> Self {
        Self {
            map: map
                .iter()
                .map(|(k, v)| (k.to_uppercase(), v.clone()))
                .collect(),
        }
    }

    pub fn to_broker(&self, symbol: &str) -> String {
        self.map
            .get(&symbol.to_uppercase())
            .cloned()
            .unwrap_or_else(|| symbol.to_string())
    }
}
