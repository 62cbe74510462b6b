pub mod orders;
pub mod personal_cart_items;
pub mod personal_carts;
pub mod preconfigured_cart_selections;
pub mod preconfigured_carts;
pub mod products;
pub mod recipe_cart_items;
pub mod recipe_carts;
pub mod recipe_ingredients;
pub mod recipes;

pub use orders::Entity as Orders;
pub use personal_cart_items::Entity as PersonalCartItems;
pub use personal_carts::Entity as PersonalCarts;
pub use preconfigured_cart_selections::Entity as PreconfiguredCartSelections;
pub use preconfigured_carts::Entity as PreconfiguredCarts;
pub use products::Entity as Products;
pub use recipe_cart_items::Entity as RecipeCartItems;
pub use recipe_carts::Entity as RecipeCarts;
pub use recipe_ingredients::Entity as RecipeIngredients;
pub use recipes::Entity as Recipes;
