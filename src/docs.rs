use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{authz, models, routes};

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::auth::register,
		routes::auth::login,
		routes::auth::me,
		routes::auth::abilities,
		routes::auth::logout,
		routes::users::list_users,
		routes::users::get_user,
		routes::users::update_user,
		routes::users::change_password,
		routes::users::delete_user,
		routes::products::list_products,
		routes::products::get_product,
		routes::products::create_product,
		routes::products::update_product,
		routes::products::delete_product,
		routes::categories::list_categories,
		routes::categories::get_category,
		routes::categories::create_category,
		routes::categories::update_category,
		routes::categories::delete_category,
		routes::cart::list_carts,
		routes::cart::create_cart,
		routes::cart::get_cart,
		routes::cart::update_cart,
		routes::cart::delete_cart,
		routes::reviews::list_reviews,
		routes::reviews::create_review,
		routes::reviews::get_review,
		routes::reviews::update_review,
		routes::reviews::delete_review,
		routes::orders::list_orders,
		routes::orders::create_order,
		routes::orders::get_order,
		routes::orders::update_order,
		routes::orders::delete_order
	),
	components(
		schemas(
			authz::Action,
			authz::SubjectType,
			authz::Role,
			models::user::User,
			models::user::AuthResponse,
			models::user::LoginRequest,
			models::user::RegisterRequest,
			models::user::UserUpdateRequest,
			models::user::ChangePasswordRequest,
			models::product::Product,
			models::product::ProductCreateRequest,
			models::product::ProductUpdateRequest,
			models::product::ProductSortBy,
			models::category::Category,
			models::category::CategoryCreateRequest,
			models::category::CategoryUpdateRequest,
			models::category::CategorySortBy,
			models::cart::Cart,
			models::cart::CartItem,
			models::cart::CartItemRequest,
			models::cart::CartCreateRequest,
			models::cart::CartUpdateRequest,
			models::cart::CartSortBy,
			models::pagination::SortOrder,
			models::review::Review,
			models::review::ReviewCreateRequest,
			models::review::ReviewUpdateRequest,
			models::order::Order,
			models::order::OrderItem,
			models::order::OrderStatus,
			models::order::Address,
			models::order::OrderItemRequest,
			models::order::OrderCreateRequest,
			models::order::OrderUpdateRequest,
			models::pagination::UserPage,
			models::pagination::ProductPage,
			models::pagination::CategoryPage,
			models::pagination::CartPage,
			models::pagination::ReviewPage,
			models::pagination::OrderPage,
			routes::auth::MessageResponse,
			routes::health::HealthResponse
		)
	),
	tags(
		(name = "Health", description = "Service liveness"),
		(name = "Auth", description = "Authentication endpoints"),
		(name = "Users", description = "User administration"),
		(name = "Products", description = "Product catalog"),
		(name = "Categories", description = "Product categories"),
		(name = "Cart", description = "Shopping carts"),
		(name = "Reviews", description = "Product reviews"),
		(name = "Orders", description = "Order management")
	)
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(&ApiDoc::openapi())?;

	normalize_path_operations(&mut doc);
	ensure_security_components(&mut doc);
	ensure_global_security(&mut doc);
	ensure_openapi_version(&mut doc);
	add_examples(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: &utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(doc)?);

	let json_route = get(move || {
		let doc_json = Arc::clone(&doc_json);
		async move { Json((*doc_json).clone()) }
	});

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn normalize_path_operations(doc: &mut Value) {
	if let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) {
		let snapshot = paths.clone();
		for (path, item) in snapshot {
			if let Some(ops) = item.as_object() {
				let mut normalized = Map::new();
				for (method, val) in ops {
					let key = method.to_lowercase();
					if let Some(existing) = normalized.get_mut(&key) {
						merge_values(existing, val);
					} else {
						normalized.insert(key, val.clone());
					}
				}
				paths.insert(path, Value::Object(normalized));
			}
		}
	}
}

fn ensure_security_components(doc: &mut Value) {
	let Some(root) = doc.as_object_mut() else { return; };

	let components = root
		.entry("components")
		.or_insert_with(|| Value::Object(Map::new()));
	let Some(components) = components.as_object_mut() else { return; };

	let schemes = components
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()));
	let Some(schemes) = schemes.as_object_mut() else { return; };

	schemes.insert(
		"bearerAuth".to_string(),
		json!({
			"type": "http",
			"scheme": "bearer",
			"bearerFormat": "JWT"
		}),
	);
}

fn ensure_global_security(doc: &mut Value) {
	if let Some(root) = doc.as_object_mut() {
		root.entry("security")
			.or_insert_with(|| json!([{ "bearerAuth": [] }]));
	}
}

fn ensure_openapi_version(doc: &mut Value) {
	if let Some(root) = doc.as_object_mut() {
		root.entry("openapi")
			.or_insert_with(|| Value::String("3.1.0".to_string()));
	}
}

fn add_examples(doc: &mut Value) {
	if let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) {
		for item in paths.values_mut() {
			if let Some(operations) = item.as_object_mut() {
				for operation in operations.values_mut() {
					apply_request_examples(operation);
				}
			}
		}
	}
}

fn apply_request_examples(operation: &mut Value) {
	let Some(request_body) = operation.get_mut("requestBody") else { return; };
	let Some(content) = request_body.get_mut("content").and_then(Value::as_object_mut) else { return; };
	let Some(app_json) = content.get_mut("application/json").and_then(Value::as_object_mut) else { return; };
	let Some(schema) = app_json.get("schema").and_then(Value::as_object) else { return; };
	let Some(reference) = schema.get("$ref").and_then(Value::as_str) else { return; };

	let example = match reference {
		"#/components/schemas/LoginRequest" => Some(json!({
			"email": "ada@example.com",
			"password": "S3cureP@ssw0rd"
		})),
		"#/components/schemas/RegisterRequest" => Some(json!({
			"email": "ada@example.com",
			"password": "S3cureP@ssw0rd",
			"first_name": "Ada",
			"last_name": "Lovelace",
			"phone": "+44 20 7946 0000"
		})),
		"#/components/schemas/ProductCreateRequest" => Some(json!({
			"name": "Analytical Engine",
			"description": "Mechanical general-purpose computer.",
			"price": 1843.0,
			"stock_quantity": 3,
			"sku": "AE-1843",
			"category_id": 1
		})),
		"#/components/schemas/CategoryCreateRequest" => Some(json!({
			"name": "Calculating Machines",
			"description": "Difference and analytical engines."
		})),
		"#/components/schemas/CartCreateRequest" => Some(json!({
			"items": [{ "product_id": 1, "quantity": 1 }]
		})),
		"#/components/schemas/ChangePasswordRequest" => Some(json!({
			"current_password": "S3cureP@ssw0rd",
			"new_password": "An0ther-S3cret"
		})),
		"#/components/schemas/ReviewCreateRequest" => Some(json!({
			"product_id": 1,
			"rating": 5,
			"comment": "Computes Bernoulli numbers flawlessly."
		})),
		"#/components/schemas/OrderCreateRequest" => Some(json!({
			"items": [{ "product_id": 1, "quantity": 2 }],
			"shipping_address": {
				"first_name": "Ada",
				"last_name": "Lovelace",
				"street": "12 St James's Square",
				"city": "London",
				"state": "London",
				"zip_code": "SW1Y 4JH",
				"country": "UK"
			},
			"tax": 0.0,
			"shipping": 4.99
		})),
		"#/components/schemas/OrderUpdateRequest" => Some(json!({
			"status": "shipped"
		})),
		_ => None,
	};

	if let Some(example) = example {
		app_json.insert("example".to_string(), example);
	}
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server_url = format!("http://localhost:{}", port);

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}

fn merge_values(target: &mut Value, addition: &Value) {
	match (target, addition) {
		(Value::Object(dest), Value::Object(src)) => {
			for (key, value) in src {
				if let Some(existing) = dest.get_mut(key) {
					merge_values(existing, value);
				} else {
					dest.insert(key.clone(), value.clone());
				}
			}
		}
		(Value::Array(dest), Value::Array(src)) => {
			for item in src {
				if !dest.contains(item) {
					dest.push(item.clone());
				}
			}
		}
		_ => {}
	}
}
