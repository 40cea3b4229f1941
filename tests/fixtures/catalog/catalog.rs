use switchyard::prelude::*;

#[controller(path = "/catalog", name = "Catalog")]
pub struct CatalogController;

#[routes]
impl CatalogController {
    #[get("/{sku}")]
    pub fn item(&self, #[path_variable] sku: String) -> String {
        sku
    }

    #[post]
    #[validate(rules = ["title@Required", "price@FloatGt:0@msg:price must be positive"])]
    pub fn add(&self, #[map_bind] data: Map<String, Value>) -> Json<Map<String, Value>> {
        Json(data)
    }

    pub fn helper(&self) -> usize {
        0
    }
}
